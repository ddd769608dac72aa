//! Server address parsing and edition detection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RegistryError;
use crate::transport::Edition;

/// Edition requested at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditionChoice {
    #[default]
    Auto,
    Bedrock,
    Java,
}

impl EditionChoice {
    /// Resolve against the port. `Auto` means Java on 25565/25566 and
    /// Bedrock everywhere else.
    pub fn resolve(self, port: u16) -> Edition {
        match self {
            Self::Bedrock => Edition::Bedrock,
            Self::Java => Edition::Java,
            Self::Auto if matches!(port, 25565 | 25566) => Edition::Java,
            Self::Auto => Edition::Bedrock,
        }
    }
}

impl fmt::Display for EditionChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Bedrock => write!(f, "bedrock"),
            Self::Java => write!(f, "java"),
        }
    }
}

impl FromStr for EditionChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "bedrock" => Ok(Self::Bedrock),
            "java" => Ok(Self::Java),
            _ => Err(format!("Unknown edition: {s}. Use 'auto', 'bedrock' or 'java'")),
        }
    }
}

/// Ports used when the address carries none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DefaultPorts {
    pub bedrock: u16,
    pub java: u16,
}

impl Default for DefaultPorts {
    fn default() -> Self {
        Self {
            bedrock: Edition::Bedrock.default_port(),
            java: Edition::Java.default_port(),
        }
    }
}

/// A validated `host:port` with its resolved edition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
    pub edition: Edition,
}

/// Parse `host[:port]`.
pub fn parse_address(input: &str, choice: EditionChoice, defaults: DefaultPorts) -> Result<ServerAddress, RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidAddress {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = input.trim();
    let (host, port) = match trimmed.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port.trim().parse().map_err(|_| invalid("port must be a number between 1 and 65535"))?;
            if port == 0 {
                return Err(invalid("port must be a number between 1 and 65535"));
            }
            (host.trim(), port)
        }
        None => {
            let port = match choice {
                EditionChoice::Java => defaults.java,
                EditionChoice::Auto | EditionChoice::Bedrock => defaults.bedrock,
            };
            (trimmed, port)
        }
    };

    if host.is_empty() {
        return Err(invalid("host must not be empty"));
    }
    if host.chars().any(char::is_whitespace) {
        return Err(invalid("host must not contain whitespace"));
    }

    Ok(ServerAddress {
        host: host.to_string(),
        port,
        edition: choice.resolve(port),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str, choice: EditionChoice) -> Result<ServerAddress, RegistryError> {
        parse_address(input, choice, DefaultPorts::default())
    }

    #[test]
    fn test_missing_port_uses_edition_default() {
        let addr = parse("play.example.net", EditionChoice::Auto).unwrap();
        assert_eq!(addr.port, 19132);
        assert_eq!(addr.edition, Edition::Bedrock);

        let addr = parse("play.example.net", EditionChoice::Java).unwrap();
        assert_eq!(addr.port, 25565);
        assert_eq!(addr.edition, Edition::Java);
    }

    #[test]
    fn test_auto_detects_java_ports() {
        assert_eq!(parse("h:25565", EditionChoice::Auto).unwrap().edition, Edition::Java);
        assert_eq!(parse("h:25566", EditionChoice::Auto).unwrap().edition, Edition::Java);
        assert_eq!(parse("h:19133", EditionChoice::Auto).unwrap().edition, Edition::Bedrock);
        assert_eq!(parse("h:30000", EditionChoice::Auto).unwrap().edition, Edition::Bedrock);
    }

    #[test]
    fn test_explicit_edition_wins_over_port() {
        let addr = parse("h:25565", EditionChoice::Bedrock).unwrap();
        assert_eq!(addr.edition, Edition::Bedrock);
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let addr = parse("  192.168.1.1 : 25566 ", EditionChoice::Auto).unwrap();
        assert_eq!(addr.host, "192.168.1.1");
        assert_eq!(addr.port, 25566);
    }

    #[test]
    fn test_invalid_addresses() {
        for input in ["", ":19132", "host:", "host:0", "host:70000", "host:abc", "my host:1"] {
            assert!(
                matches!(parse(input, EditionChoice::Auto), Err(RegistryError::InvalidAddress { .. })),
                "expected {input:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_edition_choice_from_str() {
        assert_eq!("AUTO".parse::<EditionChoice>().unwrap(), EditionChoice::Auto);
        assert_eq!("java".parse::<EditionChoice>().unwrap(), EditionChoice::Java);
        assert!("pocket".parse::<EditionChoice>().is_err());
    }
}
