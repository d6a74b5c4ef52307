use log::{debug, info};
use serde::Deserialize;
use serde_yaml::{self, Value};
use std::{
    collections::BTreeMap as Map,
    convert::TryFrom,
    fmt,
    fs::File,
    path::{Path, PathBuf},
};

use crate::{
    errors::ParseError,
    models::{NormalizedService, PortMapping, Protocol, ResolvedImage},
    services::ComposerFrontend,
};

/// A parsed compose file. Unknown keys are ignored.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct DockerComposeFile {
    pub version: Option<Scalar>,

    #[serde(default)]
    pub services: Map<String, Service>,

    pub networks: Option<Value>,

    pub volumes: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Service {
    pub image: Option<String>,

    pub build: Option<Build>,

    #[serde(default)]
    pub ports: Vec<Port>,

    pub environment: Option<Environment>,

    #[serde(default)]
    pub volumes: Vec<Volume>,

    pub depends_on: Option<DependsOn>,

    pub healthcheck: Option<HealthCheck>,

    pub deploy: Option<Deploy>,

    pub restart: Option<String>,

    pub networks: Option<Value>,

    pub command: Option<Command>,

    pub working_dir: Option<String>,

    pub user: Option<String>,

    #[serde(default)]
    pub labels: MapList,

    #[serde(default)]
    pub expose: Vec<Scalar>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(serde_yaml::Number),
    Bool(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(text) => f.write_str(text),
            Scalar::Number(number) => write!(f, "{}", number),
            Scalar::Bool(value) => write!(f, "{}", value),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Build {
    Short(String),
    Extended {
        context: Option<Value>,

        dockerfile: Option<String>,

        #[serde(default)]
        args: MapList,

        target: Option<String>,
    },
    Other(Value),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Port {
    Number(i64),
    Short(String),
    Long {
        target: Option<Value>,

        published: Option<Value>,

        protocol: Option<String>,
    },
    Other(Value),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Environment {
    Map(Map<String, Value>),
    List(Vec<Value>),
    Other(Value),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DependsOn {
    List(Vec<Value>),
    Map(Map<String, Value>),
    Other(Value),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Volume {
    Short(String),
    Long {
        #[serde(rename = "type")]
        kind: Option<String>,

        source: Option<String>,

        target: Option<String>,

        read_only: Option<bool>,
    },
    Other(Value),
}

impl Volume {
    /// Renders the volume in the `source:target[:ro]` short syntax.
    pub fn display(&self) -> String {
        match self {
            Volume::Short(volume) => volume.clone(),
            Volume::Long {
                source,
                target,
                read_only,
                ..
            } => {
                let mut volume = match (source, target) {
                    (Some(source), Some(target)) => format!("{}:{}", source, target),
                    (None, Some(target)) => target.clone(),
                    (Some(source), None) => source.clone(),
                    (None, None) => String::new(),
                };
                if read_only.unwrap_or(false) {
                    volume.push_str(":ro");
                }
                volume
            }
            Volume::Other(value) => value_to_string(value),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Command {
    Shell(String),
    Exec(Vec<Scalar>),
    Other(Value),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Shell(command) => f.write_str(command),
            Command::Exec(args) => {
                let args: Vec<String> = args.iter().map(Scalar::to_string).collect();
                f.write_str(&args.join(" "))
            }
            Command::Other(value) => f.write_str(&value_to_string(value)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct HealthCheck {
    pub test: Option<Command>,

    pub interval: Option<String>,

    pub timeout: Option<String>,

    pub retries: Option<u64>,

    pub start_period: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Deploy {
    pub replicas: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MapList {
    Map(Map<String, Value>),
    List(Vec<String>),
}

impl Default for MapList {
    fn default() -> Self {
        MapList::List(Vec::new())
    }
}

impl MapList {
    pub fn to_map(&self) -> Map<String, String> {
        match self {
            MapList::Map(map) => map
                .iter()
                .map(|(key, value)| (key.clone(), value_to_string(value)))
                .collect(),
            MapList::List(list) => list.iter().filter_map(|item| split_value(item)).collect(),
        }
    }
}

/// Splits `KEY=VALUE` on the first `=`. Entries without one are dropped.
fn split_value(value: &str) -> Option<(String, String)> {
    let split_index = value.find('=')?;
    let (key, value) = value.split_at(split_index);
    Some((key.into(), value[1..].into()))
}

/// Renders a YAML scalar the way it was written. Null becomes empty.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(value) => value.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        other => serde_yaml::to_string(other)
            .map(|yaml| yaml.trim_start_matches("---").trim().to_owned())
            .unwrap_or_default(),
    }
}

fn value_to_port(value: &Value) -> Option<u16> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|port| u16::try_from(port).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

impl DockerComposeFile {
    /// Projects every service into its canonical shape, ordered by name.
    pub fn normalize(&self) -> Vec<NormalizedService<'_>> {
        self.services
            .iter()
            .map(|(name, service)| service.normalize(name))
            .collect()
    }
}

impl Service {
    pub fn normalize(&self, name: &str) -> NormalizedService<'_> {
        NormalizedService {
            name: name.to_owned(),
            resolved_image: self.resolve_image(),
            resolved_ports: self.resolve_ports(),
            environment: self.resolve_environment(),
            dependencies: self.resolve_dependencies(),
            original: self,
        }
    }

    pub fn resolve_image(&self) -> ResolvedImage {
        if let Some(image) = &self.image {
            return ResolvedImage::Concrete(image.clone());
        }

        let context = match &self.build {
            Some(Build::Short(context)) => context.clone(),
            Some(Build::Extended {
                context: Some(Value::String(context)),
                ..
            }) => context.clone(),
            Some(_) => ".".to_owned(),
            None => return ResolvedImage::Unspecified,
        };

        ResolvedImage::BuildRequired(context)
    }

    pub fn resolve_ports(&self) -> Vec<PortMapping> {
        self.ports
            .iter()
            .filter_map(|port| {
                let mapping = port.resolve();
                if mapping.is_none() {
                    debug!("dropping malformed port entry {:?}", port);
                }
                mapping
            })
            .collect()
    }

    pub fn resolve_environment(&self) -> Map<String, String> {
        match &self.environment {
            Some(Environment::Map(map)) => map
                .iter()
                .map(|(key, value)| (key.clone(), value_to_string(value)))
                .collect(),
            Some(Environment::List(list)) => list
                .iter()
                .filter_map(Value::as_str)
                .filter_map(split_value)
                .collect(),
            Some(Environment::Other(_)) | None => Map::new(),
        }
    }

    pub fn resolve_dependencies(&self) -> Vec<String> {
        let names: Vec<&str> = match &self.depends_on {
            Some(DependsOn::List(list)) => list.iter().filter_map(Value::as_str).collect(),
            Some(DependsOn::Map(map)) => map.keys().map(String::as_str).collect(),
            Some(DependsOn::Other(_)) | None => Vec::new(),
        };

        let mut dependencies: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if !dependencies.iter().any(|dependency| dependency == name) {
                dependencies.push(name.to_owned());
            }
        }
        dependencies
    }
}

impl Port {
    pub fn resolve(&self) -> Option<PortMapping> {
        match self {
            Port::Number(port) => {
                let port = u16::try_from(*port).ok()?;
                Some(PortMapping::tcp(port, port))
            }
            Port::Short(port) => match port.find(':') {
                Some(split_index) => {
                    let host: u16 = port[..split_index].parse().ok()?;
                    let container: u16 = port[split_index + 1..].parse().ok()?;
                    Some(PortMapping::tcp(host, container))
                }
                None => {
                    let port: u16 = port.parse().ok()?;
                    Some(PortMapping::tcp(port, port))
                }
            },
            Port::Long {
                target,
                published,
                protocol,
            } => {
                let container = target.as_ref().and_then(value_to_port)?;
                let host = published.as_ref().and_then(value_to_port)?;
                let protocol = match protocol {
                    Some(protocol) => protocol.parse().ok()?,
                    None => Protocol::default(),
                };

                if host == 0 || container == 0 {
                    return None;
                }

                Some(PortMapping {
                    host,
                    container,
                    protocol,
                })
            }
            Port::Other(_) => None,
        }
    }
}

pub struct DockerComposeFrontend;

impl DockerComposeFrontend {
    pub fn new() -> DockerComposeFrontend {
        DockerComposeFrontend
    }
}

impl ComposerFrontend for DockerComposeFrontend {
    fn load<P: AsRef<Path>>(
        &mut self,
        compose_file_path: P,
    ) -> Result<DockerComposeFile, ParseError> {
        let path = PathBuf::from(compose_file_path.as_ref());
        let compose_file = File::open(&path).map_err(|source| ParseError::Read {
            path: path.clone(),
            source,
        })?;

        let file: DockerComposeFile = serde_yaml::from_reader(compose_file)
            .map_err(|source| ParseError::Decode { path, source })?;
        info!("parsed {} services", file.services.len());

        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(yaml: &str) -> DockerComposeFile {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn service(yaml: &str) -> Service {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn resolves_image_build_and_unspecified() {
        let file = parse(
            r#"
version: "3.8"
services:
  web:
    image: nginx:latest
    build: ./ignored
  api:
    build: ./api
  worker:
    build:
      context: ./svc
      dockerfile: Dockerfile.worker
  cron:
    build:
      dockerfile: Dockerfile
  bad:
    build:
      context: [1, 2]
  db: {}
"#,
        );

        let image = |name: &str| file.services[name].resolve_image();
        assert_eq!(image("web"), ResolvedImage::Concrete("nginx:latest".into()));
        assert_eq!(image("api"), ResolvedImage::BuildRequired("./api".into()));
        assert_eq!(image("worker"), ResolvedImage::BuildRequired("./svc".into()));
        assert_eq!(image("cron"), ResolvedImage::BuildRequired(".".into()));
        assert_eq!(image("bad"), ResolvedImage::BuildRequired(".".into()));
        assert_eq!(image("db"), ResolvedImage::Unspecified);
    }

    #[test]
    fn resolves_every_port_encoding() {
        let service = service(
            r#"
ports:
  - "8080:80"
  - 80
  - "9000"
  - abc
  - "x:80"
  - "127.0.0.1:5432:5432"
  - target: 53
    published: 5353
    protocol: udp
  - target: 443
    published: "8443"
  - target: 80
  - target: 0
    published: 80
  - target: 80
    published: 80
    protocol: sctp
  - [1, 2]
"#,
        );

        assert_eq!(
            service.resolve_ports(),
            vec![
                PortMapping::tcp(8080, 80),
                PortMapping::tcp(80, 80),
                PortMapping::tcp(9000, 9000),
                PortMapping {
                    host: 5353,
                    container: 53,
                    protocol: Protocol::Udp,
                },
                PortMapping::tcp(8443, 443),
            ]
        );
    }

    #[test]
    fn resolves_environment_list() {
        let service = service(
            r#"
environment:
  - A=1
  - B=2
  - NOEQUALS
  - C=x=y
  - D=
"#,
        );

        let environment = service.resolve_environment();
        let expected: Map<String, String> = vec![
            ("A", "1"),
            ("B", "2"),
            ("C", "x=y"),
            ("D", ""),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect();
        assert_eq!(environment, expected);
    }

    #[test]
    fn resolves_environment_map() {
        let service = service(
            r#"
environment:
  NAME: app
  PORT: 8080
  DEBUG: true
  EMPTY:
"#,
        );

        let environment = service.resolve_environment();
        assert_eq!(environment["NAME"], "app");
        assert_eq!(environment["PORT"], "8080");
        assert_eq!(environment["DEBUG"], "true");
        assert_eq!(environment["EMPTY"], "");
    }

    #[test]
    fn environment_list_last_write_wins() {
        let service = service("environment: [\"A=1\", \"A=2\"]");
        assert_eq!(service.resolve_environment()["A"], "2");
    }

    #[test]
    fn resolves_dependencies() {
        let list = service("depends_on: [db, cache, db]");
        assert_eq!(list.resolve_dependencies(), vec!["db", "cache"]);

        let map = service(
            r#"
depends_on:
  db:
    condition: service_healthy
  cache:
    condition: service_started
"#,
        );
        let mut dependencies = map.resolve_dependencies();
        dependencies.sort();
        assert_eq!(dependencies, vec!["cache", "db"]);

        assert!(service("{}").resolve_dependencies().is_empty());
        assert!(service("depends_on: []").resolve_dependencies().is_empty());
    }

    #[test]
    fn preserves_fields_it_does_not_normalize() {
        let service = service(
            r#"
image: postgres:16
volumes:
  - ./data:/var/lib/postgresql/data
  - type: bind
    source: ./conf
    target: /etc/postgresql
    read_only: true
restart: unless-stopped
working_dir: /srv
user: postgres
command: ["postgres", "-c", "fsync=off"]
healthcheck:
  test: ["CMD", "pg_isready"]
  interval: 10s
  retries: 5
deploy:
  replicas: 2
labels:
  - com.example.tier=db
expose:
  - 5432
  - "5433"
unknown_key: ignored
"#,
        );

        let volumes: Vec<String> = service.volumes.iter().map(Volume::display).collect();
        assert_eq!(
            volumes,
            vec![
                "./data:/var/lib/postgresql/data",
                "./conf:/etc/postgresql:ro"
            ]
        );
        assert_eq!(service.restart.as_deref(), Some("unless-stopped"));
        assert_eq!(service.working_dir.as_deref(), Some("/srv"));
        assert_eq!(service.user.as_deref(), Some("postgres"));
        assert!(matches!(service.command, Some(Command::Exec(_))));
        assert_eq!(service.healthcheck.as_ref().unwrap().retries, Some(5));
        assert_eq!(service.deploy.as_ref().unwrap().replicas, Some(2));
        assert_eq!(service.labels.to_map()["com.example.tier"], "db");
        assert_eq!(service.expose.len(), 2);
    }

    #[test]
    fn normalizes_services_with_back_reference() {
        let file = parse(
            r#"
services:
  web:
    image: nginx
    ports: ["80"]
  api:
    build:
      context: ./svc
    environment: ["A=1"]
    depends_on: [web]
"#,
        );

        let services = file.normalize();
        assert_eq!(services.len(), 2);

        let api = services.iter().find(|service| service.name == "api").unwrap();
        assert_eq!(api.resolved_image, ResolvedImage::BuildRequired("./svc".into()));
        assert_eq!(api.environment["A"], "1");
        assert_eq!(api.dependencies, vec!["web"]);
        assert!(std::ptr::eq(api.original, &file.services["api"]));
    }

    #[test]
    fn normalizing_twice_is_idempotent() {
        let file = parse(
            r#"
services:
  web:
    image: nginx
    ports: ["8080:80", 443]
    environment:
      A: 1
  worker:
    build: .
    depends_on:
      web:
        condition: service_started
"#,
        );

        assert_eq!(file.normalize(), file.normalize());
    }

    #[test]
    fn accepts_numeric_version_and_missing_services() {
        let file = parse("version: 3\nnetworks:\n  default: {}\n");
        assert_eq!(file.version.as_ref().map(|version| version.to_string()), Some("3".into()));
        assert!(file.normalize().is_empty());
    }

    #[test]
    fn load_reports_read_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("docker-compose.yml");

        let err = DockerComposeFrontend::new().load(&missing).unwrap_err();
        assert!(matches!(err, ParseError::Read { .. }));
    }

    #[test]
    fn load_reports_decode_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "services:\n  web:\n    image: [unterminated").unwrap();

        let err = DockerComposeFrontend::new().load(file.path()).unwrap_err();
        assert!(matches!(err, ParseError::Decode { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "services: [web, api]").unwrap();

        let err = DockerComposeFrontend::new().load(file.path()).unwrap_err();
        assert!(matches!(err, ParseError::Decode { .. }));
    }

    #[test]
    fn load_parses_a_compose_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "version: '3'\nservices:\n  web:\n    image: nginx:alpine\n    ports:\n      - \"8080:80\"\n"
        )
        .unwrap();

        let compose = DockerComposeFrontend::new().load(file.path()).unwrap();
        let services = compose.normalize();
        assert_eq!(services[0].name, "web");
        assert_eq!(services[0].resolved_ports, vec![PortMapping::tcp(8080, 80)]);
    }
}
