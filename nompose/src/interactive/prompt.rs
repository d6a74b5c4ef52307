use crossterm::{
    style::{self, Colorize, Styler},
    QueueableCommand,
};
use log::debug;
use std::io::{BufRead, Write};

use crate::errors::InputError;

pub const DEFAULT_MAX_RETRIES: usize = 5;

fn is_yes(answer: &str) -> bool {
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

fn is_no(answer: &str) -> bool {
    answer.eq_ignore_ascii_case("n") || answer.eq_ignore_ascii_case("no")
}

/// Line oriented question and answer channel.
pub struct Prompter<R, W> {
    input: R,
    output: W,
    max_retries: usize,
    assume_yes: bool,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Prompter<R, W> {
        Prompter {
            input,
            output,
            max_retries: DEFAULT_MAX_RETRIES,
            assume_yes: false,
        }
    }

    /// How many times an empty answer to a required field is re-asked
    /// before giving up.
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Keep every current value and answer yes to every question without
    /// reading input.
    pub fn assume_yes(mut self, assume_yes: bool) -> Self {
        self.assume_yes = assume_yes;
        self
    }

    pub fn is_assuming_yes(&self) -> bool {
        self.assume_yes
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }

    /// Asks for a field value.
    ///
    /// With a current value the operator is asked whether to keep it: an
    /// empty or affirmative answer keeps it and returns `None`, a negative
    /// answer asks for the replacement and anything else is taken as the
    /// replacement itself. Without a current value the field is asked for
    /// directly. `None` is also returned for an empty optional field.
    pub fn prompt(
        &mut self,
        field: &str,
        current: Option<&str>,
        required: bool,
    ) -> Result<Option<String>, InputError> {
        let mut current = current.filter(|value| !value.is_empty());
        let mut retries = 0;

        loop {
            let answer = match current {
                Some(value) => {
                    writeln!(self.output, "   {}: {}", field, value)?;
                    if self.assume_yes {
                        return Ok(None);
                    }

                    let answer = self.ask("   Keep this value? (Y/n): ")?;
                    if answer.is_empty() || is_yes(&answer) {
                        return Ok(None);
                    }

                    if is_no(&answer) {
                        self.ask(&format!("   Enter new {}: ", field.to_lowercase()))?
                    } else {
                        answer
                    }
                }
                None if required => {
                    self.ask(&format!("   Please enter {}: ", field.to_lowercase()))?
                }
                None => self.ask(&format!("   Enter {} (optional): ", field.to_lowercase()))?,
            };

            if answer.is_empty() {
                if !required {
                    return Ok(None);
                }

                retries += 1;
                if retries > self.max_retries {
                    return Err(InputError::RetriesExhausted {
                        field: field.to_owned(),
                    });
                }

                self.output
                    .queue(style::PrintStyledContent("   error: ".red().bold()))?
                    .queue(style::Print(format!("{} is required.\n", field)))?;
                current = None;
                continue;
            }

            return Ok(Some(answer));
        }
    }

    /// Asks a yes/no question that defaults to yes. Only an explicit `n` or
    /// `no` answers no.
    pub fn confirm(&mut self, question: &str) -> Result<bool, InputError> {
        if self.assume_yes {
            writeln!(self.output, "   {} (Y/n): y", question)?;
            return Ok(true);
        }

        let answer = self.ask(&format!("   {} (Y/n): ", question))?;
        Ok(!is_no(&answer))
    }

    /// Prints the question and reads one trimmed line.
    pub fn ask(&mut self, question: &str) -> Result<String, InputError> {
        self.output
            .queue(style::PrintStyledContent(style::style(question).bold()))?
            .flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(InputError::Exhausted);
        }

        let answer = line.trim().to_owned();
        debug!("read answer {:?}", answer);
        Ok(answer)
    }
}
