use log::debug;

use crate::{
    errors::ClassificationError,
    models::{Source, SourceType},
};

/// Determines what kind of source a command line argument refers to.
///
/// The rules are applied in order and the first match wins. Classification
/// is purely lexical, the filesystem is never touched, and anything that
/// is not recognized falls back to a local directory.
pub fn classify(source: &str) -> Result<Source, ClassificationError> {
    let source = source.trim();

    if source.is_empty() {
        return Err(ClassificationError::EmptySource);
    }

    let source_type = source_type(source)?;
    debug!("classified {:?} as {}", source, source_type);

    Ok(Source {
        source_type,
        source: source.to_owned(),
    })
}

fn source_type(source: &str) -> Result<SourceType, ClassificationError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        return if source.contains("github.com") {
            Ok(SourceType::GitHubRepo)
        } else {
            Err(ClassificationError::UnsupportedUrl(source.to_owned()))
        };
    }

    // `image:tag` never contains a path separator.
    if source.contains(':') && !source.contains('/') && !source.contains('\\') {
        return Ok(SourceType::DockerImage);
    }

    let file_name = file_name(source);
    let extension = file_name
        .rfind('.')
        .map(|index| file_name[index..].to_ascii_lowercase());

    let is_compose = file_name == "docker-compose.yml"
        || file_name == "docker-compose.yaml"
        || matches!(extension.as_deref(), Some(".yml") | Some(".yaml"));

    if is_compose {
        return Ok(SourceType::DockerCompose);
    }

    if file_name.to_ascii_lowercase().starts_with("dockerfile") {
        return Ok(SourceType::Dockerfile);
    }

    Ok(SourceType::LocalDirectory)
}

/// Last path component, treating both `/` and `\` as separators.
fn file_name(source: &str) -> &str {
    let trimmed = source.trim_end_matches(|c| c == '/' || c == '\\');
    if trimmed.is_empty() {
        return source;
    }

    trimmed
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(trimmed)
}
