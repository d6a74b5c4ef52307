use std::{collections::BTreeMap as Map, fmt, str::FromStr};

use crate::frontends::docker_compose::Service;

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum SourceType {
    DockerCompose,
    Dockerfile,
    DockerImage,
    LocalDirectory,
    GitHubRepo,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceType::DockerCompose => "docker-compose",
            SourceType::Dockerfile => "dockerfile",
            SourceType::DockerImage => "docker-image",
            SourceType::LocalDirectory => "local-directory",
            SourceType::GitHubRepo => "github-repo",
        };
        f.write_str(name)
    }
}

/// A classified input source. The source string is stored trimmed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Source {
    pub source_type: SourceType,
    pub source: String,
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol::Tcp
    }
}

impl FromStr for Protocol {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("tcp"),
            Protocol::Udp => f.write_str("udp"),
        }
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
    pub protocol: Protocol,
}

impl PortMapping {
    pub fn tcp(host: u16, container: u16) -> PortMapping {
        PortMapping {
            host,
            container,
            protocol: Protocol::Tcp,
        }
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.host, self.container, self.protocol)
    }
}

/// The image a service will run, or the decision still pending for it.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum ResolvedImage {
    Concrete(String),
    /// No image is given, the service must be built from this context path.
    BuildRequired(String),
    Unspecified,
}

impl fmt::Display for ResolvedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedImage::Concrete(image) => f.write_str(image),
            ResolvedImage::BuildRequired(context) => write!(f, "build required: {}", context),
            ResolvedImage::Unspecified => f.write_str("no image specified"),
        }
    }
}

/// Canonical view of a compose service. `original` borrows the parsed
/// document for the fields this model does not normalize.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedService<'a> {
    pub name: String,
    pub resolved_image: ResolvedImage,
    pub resolved_ports: Vec<PortMapping>,
    pub environment: Map<String, String>,
    pub dependencies: Vec<String>,
    pub original: &'a Service,
}

/// Build steps the operator chose to run later. Never executed here.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct BuildPlan {
    pub image: String,
    pub context: String,
    pub push: bool,
}

impl BuildPlan {
    pub fn commands(&self) -> Vec<String> {
        let mut commands = vec![format!("docker build -t {} {}", self.image, self.context)];
        if self.push {
            commands.push(format!("docker push {}", self.image));
        }
        commands
    }
}

/// A service after operator confirmation. The image is always concrete.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfirmedService<'a> {
    pub name: String,
    pub image: String,
    pub build: Option<BuildPlan>,
    pub ports: Vec<PortMapping>,
    pub environment: Map<String, String>,
    pub dependencies: Vec<String>,
    pub original: &'a Service,
}
