use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use log::info;

pub const DEFAULT_GREETING: &str = "Hello , ask me doubts about DSA";

pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are Rohit Negi, a coder, YouTuber, instructor and Data Structures and Algorithms teacher. \
You use slang like \"chamka\" when you clear a concept about Data Structures and Algorithms \
and \"kuch to fata\" when the code breaks. \
If the user asks a question that is not related to DSA, reply rudely and steer them back with a more useful reply. \
Keep answers short: one or two lines at most, never a full detailed explanation.";

#[derive(Debug)]
pub enum PersonaError {
    EmptyInstruction,
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PersonaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersonaError::EmptyInstruction => write!(f, "Persona system_instruction must not be empty"),
            PersonaError::IoError(e) => write!(f, "Persona file IO error: {}", e),
            PersonaError::JsonError(e) => write!(f, "Persona JSON parsing error: {}", e),
        }
    }
}

impl Error for PersonaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PersonaError::IoError(e) => Some(e),
            PersonaError::JsonError(e) => Some(e),
            PersonaError::EmptyInstruction => None,
        }
    }
}

impl From<std::io::Error> for PersonaError {
    fn from(err: std::io::Error) -> Self {
        PersonaError::IoError(err)
    }
}

impl From<serde_json::Error> for PersonaError {
    fn from(err: serde_json::Error) -> Self {
        PersonaError::JsonError(err)
    }
}

/// Fixed instruction sent with every model call, plus the widget's opening line.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PersonaConfig {
    pub system_instruction: String,
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            greeting: default_greeting(),
        }
    }
}

impl PersonaConfig {
    fn validate(&self) -> Result<(), PersonaError> {
        if self.system_instruction.trim().is_empty() {
            return Err(PersonaError::EmptyInstruction);
        }
        Ok(())
    }
}

pub fn load_persona<P: AsRef<Path>>(path: P) -> Result<Arc<PersonaConfig>, PersonaError> {
    let file_content = fs::read_to_string(path.as_ref())?;
    let config: PersonaConfig = serde_json::from_str(&file_content)?;
    config.validate()?;
    info!("Loaded persona from {}", path.as_ref().display());
    Ok(Arc::new(config))
}

/// Uses the file at `path` when given, the built-in persona otherwise.
pub fn resolve_persona(path: Option<&str>) -> Result<Arc<PersonaConfig>, PersonaError> {
    match path.filter(|p| !p.trim().is_empty()) {
        Some(p) => load_persona(p),
        None => Ok(Arc::new(PersonaConfig::default())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn persona_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn loads_persona_and_defaults_greeting() {
        let file = persona_file(r#"{"system_instruction": "Answer like a pirate."}"#);
        let persona = load_persona(file.path()).expect("load");
        assert_eq!(persona.system_instruction, "Answer like a pirate.");
        assert_eq!(persona.greeting, DEFAULT_GREETING);
    }

    #[test]
    fn rejects_blank_instruction() {
        let file = persona_file(r#"{"system_instruction": "  ", "greeting": "hi"}"#);
        assert!(matches!(load_persona(file.path()), Err(PersonaError::EmptyInstruction)));
    }

    #[test]
    fn reports_malformed_json_and_missing_file() {
        let file = persona_file("{ nope");
        assert!(matches!(load_persona(file.path()), Err(PersonaError::JsonError(_))));
        assert!(matches!(load_persona("/definitely/not/here.json"), Err(PersonaError::IoError(_))));
    }

    #[test]
    fn falls_back_to_builtin_persona() {
        let persona = resolve_persona(None).expect("default");
        assert!(persona.system_instruction.starts_with("You are Rohit Negi, a coder"));
        assert!(persona.system_instruction.contains("chamka"));
        assert!(persona.system_instruction.contains("kuch to fata"));
        assert_eq!(resolve_persona(Some("")).expect("default"), persona);
    }
}
