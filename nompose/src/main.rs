use anyhow::{anyhow, Context, Result};
use crossterm::{
    style::{self, Colorize, Styler},
    QueueableCommand,
};
use log::{info, LevelFilter};
use std::{
    env,
    io::{self, stdout, Write},
    path::{Path, PathBuf},
};
use structopt::StructOpt;

use frontends::DockerComposeFrontend;
use interactive::{prompt::DEFAULT_MAX_RETRIES, Confirmer, Prompter};
use models::{ConfirmedService, NormalizedService, SourceType};
use services::ComposerFrontend;

mod detector;
mod errors;
mod frontends;
mod interactive;
mod models;
mod services;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "nompose",
    about = "Convert Docker configurations to Nomad jobs."
)]
struct Opt {
    #[structopt(short, long, global = true)]
    /// Show debug logs unless LOG is set.
    verbose: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Analyzes a docker-compose file, Dockerfile, image, directory or GitHub
    /// repository and walks through the detected configuration.
    Generate {
        /// Source to analyze. Defaults to the nearest docker-compose.yml.
        source: Option<String>,

        #[structopt(short = "y", long = "yes")]
        /// Accept every detected value without asking.
        assume_yes: bool,

        #[structopt(long, default_value = "5")]
        /// How often an empty required value is asked again.
        max_retries: usize,
    },
}

fn find_compose_file<P: AsRef<Path>>(path: P) -> Option<PathBuf> {
    for path in path.as_ref().ancestors() {
        if let Some(compose_file_path) = compose_file_in(path) {
            return Some(compose_file_path);
        }
    }

    None
}

fn compose_file_in(directory: &Path) -> Option<PathBuf> {
    let docker_file_path = directory.join("docker-compose.yml");
    if docker_file_path.exists() {
        return Some(docker_file_path);
    }

    let docker_file_path = directory.join("docker-compose.yaml");
    if docker_file_path.exists() {
        return Some(docker_file_path);
    }

    None
}

fn init_logger(verbose: bool) {
    let mut builder = pretty_env_logger::formatted_builder();
    match env::var("LOG") {
        Ok(filters) => {
            builder.parse_filters(&filters);
        }
        Err(_) if verbose => {
            builder.filter_level(LevelFilter::Debug);
        }
        Err(_) => {
            builder.filter_level(LevelFilter::Warn);
        }
    }
    builder.init();
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    init_logger(opt.verbose);

    match opt.command {
        Command::Generate {
            source,
            assume_yes,
            max_retries,
        } => generate(source, assume_yes, max_retries),
    }
}

fn generate(source: Option<String>, assume_yes: bool, max_retries: usize) -> Result<()> {
    let mut stdout = stdout();

    let source = match source {
        Some(source) => source,
        None => {
            let current_dir = env::current_dir()?;
            let compose_file_path = find_compose_file(current_dir)
                .ok_or_else(|| anyhow!("Couldn't find a docker-compose.yml file in the current working directory or any of its parents."))?;
            info!("found compose file {:?}", compose_file_path);
            compose_file_path.to_string_lossy().into_owned()
        }
    };

    stdout.queue(style::Print(format!("Analyzing source: {}\n", source)))?;

    let source = detector::classify(&source)?;
    stdout
        .queue(style::PrintStyledContent("OK: ".green().bold()))?
        .queue(style::Print(format!(
            "detected source type: {}\n",
            source.source_type
        )))?
        .flush()?;

    let options = ConfirmOptions {
        assume_yes,
        max_retries,
    };

    match source.source_type {
        SourceType::DockerCompose => generate_compose(&mut stdout, Path::new(&source.source), options),
        SourceType::LocalDirectory => match compose_file_in(Path::new(&source.source)) {
            Some(compose_file_path) => {
                info!("found compose file {:?}", compose_file_path);
                generate_compose(&mut stdout, &compose_file_path, options)
            }
            None => not_available(&mut stdout, "Directory analysis"),
        },
        SourceType::Dockerfile => not_available(&mut stdout, "Dockerfile parsing"),
        SourceType::DockerImage => not_available(&mut stdout, "Docker image analysis"),
        SourceType::GitHubRepo => not_available(&mut stdout, "GitHub repository analysis"),
    }
}

#[derive(Copy, Clone, Debug)]
struct ConfirmOptions {
    assume_yes: bool,
    max_retries: usize,
}

impl Default for ConfirmOptions {
    fn default() -> Self {
        ConfirmOptions {
            assume_yes: false,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

fn generate_compose(
    stdout: &mut impl Write,
    compose_file_path: &Path,
    options: ConfirmOptions,
) -> Result<()> {
    stdout
        .queue(style::Print("Parsing docker-compose file...\n"))?
        .flush()?;

    let mut frontend = DockerComposeFrontend::new();
    let compose = frontend
        .load(compose_file_path)
        .context("failed to parse docker-compose file")?;
    let services = compose.normalize();

    print_detected(stdout, &services)?;

    let stdin = io::stdin();
    let prompter = Prompter::new(stdin.lock(), &mut *stdout)
        .max_retries(options.max_retries)
        .assume_yes(options.assume_yes);
    let confirmed = Confirmer::new(prompter).confirm_services(services)?;

    print_confirmed(stdout, &confirmed)?;

    stdout
        .queue(style::PrintStyledContent("INFO: ".cyan().bold()))?
        .queue(style::Print("Nomad job generation is not available yet.\n"))?
        .flush()?;

    Ok(())
}

fn print_detected(stdout: &mut impl Write, services: &[NormalizedService<'_>]) -> Result<()> {
    stdout
        .queue(style::PrintStyledContent("OK: ".green().bold()))?
        .queue(style::Print(format!("found {} services:\n", services.len())))?;

    for (index, service) in services.iter().enumerate() {
        writeln!(
            stdout,
            "   {}. {} ({})",
            index + 1,
            service.name,
            service.resolved_image
        )?;
        if !service.resolved_ports.is_empty() {
            writeln!(stdout, "      Ports: {} detected", service.resolved_ports.len())?;
        }
        if !service.environment.is_empty() {
            writeln!(stdout, "      Environment: {} variables", service.environment.len())?;
        }
    }

    stdout.flush()?;
    Ok(())
}

fn print_confirmed(stdout: &mut impl Write, services: &[ConfirmedService<'_>]) -> Result<()> {
    stdout
        .queue(style::PrintStyledContent("OK: ".green().bold()))?
        .queue(style::Print("configuration confirmed! Summary:\n"))?;

    for (index, service) in services.iter().enumerate() {
        stdout.queue(style::PrintStyledContent(
            style::style(format!("{}. {}\n", index + 1, service.name)).bold(),
        ))?;
        writeln!(stdout, "   Image: {}", service.image)?;
        if let Some(build) = &service.build {
            for command in build.commands() {
                writeln!(stdout, "   Run before deploying: {}", command)?;
            }
        }
        if !service.ports.is_empty() {
            writeln!(stdout, "   Ports: {} configured", service.ports.len())?;
        }
        writeln!(stdout, "   Environment: {} variables", service.environment.len())?;
        if !service.dependencies.is_empty() {
            writeln!(stdout, "   Dependencies: {}", service.dependencies.join(", "))?;
        }
        writeln!(stdout)?;
    }

    stdout.flush()?;
    Ok(())
}

fn not_available(stdout: &mut impl Write, feature: &str) -> Result<()> {
    stdout
        .queue(style::PrintStyledContent("INFO: ".cyan().bold()))?
        .queue(style::Print(format!("{} is not available yet.\n", feature)))?
        .flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_compose_file_in_ancestors() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("docker-compose.yaml"), "services: {}\n").unwrap();

        assert_eq!(
            find_compose_file(&nested),
            Some(dir.path().join("docker-compose.yaml"))
        );
        assert_eq!(compose_file_in(&nested), None);
    }

    #[test]
    fn prefers_yml_over_yaml() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("docker-compose.yml"), "services: {}\n").unwrap();
        fs::write(dir.path().join("docker-compose.yaml"), "services: {}\n").unwrap();

        assert_eq!(
            compose_file_in(dir.path()),
            Some(dir.path().join("docker-compose.yml"))
        );
    }

    #[test]
    fn parse_errors_are_reported_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("docker-compose.yml");
        let mut output = Vec::new();

        let err = generate_compose(&mut output, &missing, ConfirmOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "failed to parse docker-compose file");
        assert!(err.downcast_ref::<errors::ParseError>().is_some());
    }

    #[test]
    fn summaries_list_services() {
        let compose: frontends::docker_compose::DockerComposeFile = serde_yaml::from_str(
            "services:\n  web:\n    image: nginx\n    ports: [80]\n  api:\n    build: ./api\n",
        )
        .unwrap();
        let services = compose.normalize();

        let mut output = Vec::new();
        print_detected(&mut output, &services).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.contains("found 2 services"));
        assert!(output.contains("1. api (build required: ./api)"));
        assert!(output.contains("2. web (nginx)"));
        assert!(output.contains("Ports: 1 detected"));
    }

    #[test]
    fn confirmed_summary_lists_build_commands() {
        let compose: frontends::docker_compose::DockerComposeFile =
            serde_yaml::from_str("services:\n  api:\n    build: ./api\n").unwrap();
        let service = &compose.services["api"];
        let confirmed = vec![ConfirmedService {
            name: "api".into(),
            image: "registry.example.com/api:1".into(),
            build: Some(models::BuildPlan {
                image: "registry.example.com/api:1".into(),
                context: "./api".into(),
                push: true,
            }),
            ports: Vec::new(),
            environment: Default::default(),
            dependencies: Vec::new(),
            original: service,
        }];

        let mut output = Vec::new();
        print_confirmed(&mut output, &confirmed).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.contains("Image: registry.example.com/api:1"));
        assert!(output.contains("Run before deploying: docker build -t registry.example.com/api:1 ./api"));
        assert!(output.contains("Run before deploying: docker push registry.example.com/api:1"));
    }
}
