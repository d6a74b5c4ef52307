use crossterm::{
    style::{self, Colorize, Styler},
    QueueableCommand,
};
use log::{debug, info};
use std::io::{BufRead, Write};

use crate::{
    errors::InputError,
    interactive::prompt::Prompter,
    models::{BuildPlan, ConfirmedService, NormalizedService, PortMapping, ResolvedImage},
};

/// How a build-required service gets its image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BuildChoice {
    /// The image already exists somewhere.
    Existing,
    /// Build locally, the image is not pushed anywhere.
    Local,
    /// Build and push to a registry before deploying.
    Registry,
}

impl BuildChoice {
    pub fn parse(answer: &str) -> Option<BuildChoice> {
        match answer {
            "1" => Some(BuildChoice::Existing),
            "2" => Some(BuildChoice::Local),
            "3" => Some(BuildChoice::Registry),
            _ => None,
        }
    }
}

/// Walks the operator through every service, one at a time, and returns
/// the confirmed services in the same order.
pub struct Confirmer<R, W> {
    prompter: Prompter<R, W>,
}

impl<R: BufRead, W: Write> Confirmer<R, W> {
    pub fn new(prompter: Prompter<R, W>) -> Confirmer<R, W> {
        Confirmer { prompter }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.prompter.into_output()
    }

    pub fn confirm_services<'a>(
        &mut self,
        services: Vec<NormalizedService<'a>>,
    ) -> Result<Vec<ConfirmedService<'a>>, InputError> {
        {
            let output = self.prompter.output();
            writeln!(output)?;
            output
                .queue(style::PrintStyledContent(
                    "Let's review and confirm the detected configurations...\n".bold(),
                ))?
                .queue(style::Print(
                    "   Press ENTER to keep detected values, or type new values to override them.\n\n",
                ))?;
        }

        let total = services.len();
        let mut confirmed_services = Vec::with_capacity(total);

        for (index, service) in services.into_iter().enumerate() {
            {
                let output = self.prompter.output();
                output
                    .queue(style::PrintStyledContent(
                        style::style(format!("Service {}/{}: {}\n", index + 1, total, service.name))
                            .cyan()
                            .bold(),
                    ))?
                    .queue(style::Print(format!("{}\n", "─".repeat(50))))?;
            }

            let name = service.name.clone();
            let confirmed =
                self.confirm_service(service)
                    .map_err(|source| InputError::Service {
                        name,
                        source: Box::new(source),
                    })?;
            info!("confirmed service {} with image {}", confirmed.name, confirmed.image);
            confirmed_services.push(confirmed);

            writeln!(self.prompter.output())?;
        }

        Ok(confirmed_services)
    }

    pub fn confirm_service<'a>(
        &mut self,
        service: NormalizedService<'a>,
    ) -> Result<ConfirmedService<'a>, InputError> {
        let name = self
            .prompter
            .prompt("Service name", Some(service.name.as_str()), true)?
            .unwrap_or(service.name);

        let (image, build) = self.resolve_image(&name, service.resolved_image)?;

        self.confirm_ports(&service.resolved_ports)?;

        let confirmed = ConfirmedService {
            name,
            image,
            build,
            ports: service.resolved_ports,
            environment: service.environment,
            dependencies: service.dependencies,
            original: service.original,
        };
        self.show_settings(&confirmed)?;

        Ok(confirmed)
    }

    fn resolve_image(
        &mut self,
        name: &str,
        image: ResolvedImage,
    ) -> Result<(String, Option<BuildPlan>), InputError> {
        match image {
            ResolvedImage::Concrete(image) => {
                let image = self
                    .prompter
                    .prompt("Image", Some(image.as_str()), true)?
                    .unwrap_or(image);
                Ok((image, None))
            }
            ResolvedImage::BuildRequired(context) => self.resolve_build(name, context),
            ResolvedImage::Unspecified => {
                if self.prompter.is_assuming_yes() {
                    let image = default_image(name);
                    writeln!(self.prompter.output(), "   Image: {} (no image specified)", image)?;
                    return Ok((image, None));
                }

                writeln!(self.prompter.output(), "   No image specified.")?;
                let image = self
                    .prompter
                    .prompt("Image", None, true)?
                    .unwrap_or_else(|| default_image(name));
                Ok((image, None))
            }
        }
    }

    fn resolve_build(
        &mut self,
        name: &str,
        context: String,
    ) -> Result<(String, Option<BuildPlan>), InputError> {
        {
            let output = self.prompter.output();
            output
                .queue(style::PrintStyledContent("   Build configuration detected\n".yellow()))?
                .queue(style::Print(format!("   Build context: {}\n\n", context)))?
                .queue(style::Print(
                    "   How would you like to handle the Docker image?\n\
                     \x20  1. I have the image ready (enter image name/tag)\n\
                     \x20  2. Build it locally (docker build)\n\
                     \x20  3. I'll build and push later (enter final image name)\n\n",
                ))?;
        }

        // Keeping the shown choice is not a choice, it falls through to the
        // default image like any unrecognized answer.
        let answer = self.prompter.prompt("Choice [1-3]", Some("1"), true)?;
        let choice = answer.as_deref().and_then(BuildChoice::parse);
        if choice.is_none() {
            debug!("no build choice made ({:?})", answer);
        }

        let required = |image: Option<String>| image.unwrap_or_else(|| default_image(name));

        let (image, build) = match choice {
            Some(BuildChoice::Existing) => {
                let image = required(self.prompter.prompt(
                    "Image name (e.g., my-app:latest)",
                    None,
                    true,
                )?);
                (image, None)
            }
            Some(BuildChoice::Local) => {
                let suggested = default_image(name);
                let image = self
                    .prompter
                    .prompt(
                        "Image name to build (e.g., my-app:latest)",
                        Some(suggested.as_str()),
                        true,
                    )?
                    .unwrap_or(suggested);

                let plan = BuildPlan {
                    image: image.clone(),
                    context,
                    push: false,
                };
                let output = self.prompter.output();
                writeln!(output, "   Build command: {}", plan.commands().join(" && "))?;
                output
                    .queue(style::PrintStyledContent("   warning: ".yellow().bold()))?
                    .queue(style::Print(
                        "the image will be available locally only, push it to a registry for production.\n",
                    ))?;
                (image, Some(plan))
            }
            Some(BuildChoice::Registry) => {
                let image = required(self.prompter.prompt(
                    "Final image name (e.g., registry.com/my-app:latest)",
                    None,
                    true,
                )?);

                let plan = BuildPlan {
                    image: image.clone(),
                    context,
                    push: true,
                };
                let output = self.prompter.output();
                writeln!(output, "   You'll need to build and push:")?;
                for command in plan.commands() {
                    writeln!(output, "     {}", command)?;
                }
                (image, Some(plan))
            }
            None => {
                let image = default_image(name);
                writeln!(self.prompter.output(), "   Using default image {}", image)?;
                (image, None)
            }
        };

        Ok((image, build))
    }

    /// Lists the detected ports. Declining keeps them, editing is not
    /// supported.
    fn confirm_ports(&mut self, ports: &[PortMapping]) -> Result<(), InputError> {
        if ports.is_empty() {
            writeln!(self.prompter.output(), "   Ports: none detected")?;
            return Ok(());
        }

        {
            let output = self.prompter.output();
            writeln!(output, "   Ports detected:")?;
            for (index, port) in ports.iter().enumerate() {
                writeln!(output, "     {}. {}", index + 1, port)?;
            }
        }

        if !self.prompter.confirm("Keep these port mappings?")? {
            writeln!(
                self.prompter.output(),
                "   Port editing not implemented yet - keeping detected ports"
            )?;
        }

        Ok(())
    }

    fn show_settings(&mut self, service: &ConfirmedService<'_>) -> Result<(), InputError> {
        let output = self.prompter.output();
        let original = service.original;

        if !service.environment.is_empty() {
            writeln!(
                output,
                "   Environment variables: {} detected",
                service.environment.len()
            )?;
            for (key, value) in service.environment.iter() {
                writeln!(output, "     {}={}", key, value)?;
            }
        }

        if !service.dependencies.is_empty() {
            writeln!(output, "   Dependencies: {}", service.dependencies.join(", "))?;
        }

        if !original.volumes.is_empty() {
            writeln!(output, "   Volumes: {} detected", original.volumes.len())?;
            for volume in original.volumes.iter() {
                writeln!(output, "     {}", volume.display())?;
            }
        }

        if let Some(command) = &original.command {
            writeln!(output, "   Command: {}", command)?;
        }

        let labels = original.labels.to_map();
        if !labels.is_empty() {
            writeln!(output, "   Labels: {} detected", labels.len())?;
            for (key, value) in labels.iter() {
                writeln!(output, "     {}={}", key, value)?;
            }
        }

        if let Some(working_dir) = &original.working_dir {
            writeln!(output, "   Working directory: {}", working_dir)?;
        }

        if let Some(user) = &original.user {
            writeln!(output, "   User: {}", user)?;
        }

        if let Some(restart) = &original.restart {
            writeln!(output, "   Restart policy: {}", restart)?;
        }

        Ok(())
    }
}

fn default_image(name: &str) -> String {
    format!("{}:latest", name)
}
