pub mod confirm;
pub mod prompt;

pub use confirm::Confirmer;
pub use prompt::Prompter;
