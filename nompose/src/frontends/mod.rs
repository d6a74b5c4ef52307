pub mod docker_compose;

pub use docker_compose::DockerComposeFrontend;
