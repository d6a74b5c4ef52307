use std::path::Path;

use crate::{errors::ParseError, frontends::docker_compose::DockerComposeFile};

pub trait ComposerFrontend {
    fn load<P: AsRef<Path>>(&mut self, compose_file_path: P)
        -> Result<DockerComposeFile, ParseError>;
}
