use crate::error::{Error, Result};
use crate::service::ServiceDefinition;

/// Whether `s` is a valid service name or capability tag: non-empty and made
/// only of ASCII letters, digits, `_`, `-` and `.`.
///
/// ```
/// use warden::config::is_valid_identifier;
///
/// assert!(is_valid_identifier("net-online.target_2"));
/// assert!(!is_valid_identifier("bad name"));
/// assert!(!is_valid_identifier(""));
/// ```
pub fn is_valid_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Check a parsed definition. `origin` names the file it came from.
pub fn validate_definition(definition: &ServiceDefinition, origin: &str) -> Result<()> {
    if !is_valid_identifier(&definition.name) {
        return Err(Error::Validation(format!(
            "{} has invalid service name '{}', only a-Z0-9_-. allowed",
            origin, definition.name
        )));
    }
    for tag in &definition.provides {
        if !is_valid_identifier(tag) {
            return Err(Error::Validation(format!(
                "{} has invalid provides '{}', only a-Z0-9_-. allowed",
                origin, tag
            )));
        }
    }
    for tag in &definition.needs {
        if !is_valid_identifier(tag) {
            return Err(Error::Validation(format!(
                "{} has invalid needs '{}', only a-Z0-9_-. allowed",
                origin, tag
            )));
        }
    }
    if definition.startup.trim().is_empty() {
        return Err(Error::Config(format!("{} has no Startup: command", origin)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceKind;

    #[test]
    fn rejects_bad_tags() {
        let def = ServiceDefinition::new("web", ServiceKind::Simple, "httpd")
            .with_needs(["net", "disk/root"]);
        let err = validate_definition(&def, "web.service").unwrap_err();
        assert!(err.to_string().contains("invalid needs 'disk/root'"));
        assert!(err.to_string().contains("web.service"));
    }

    #[test]
    fn requires_startup() {
        let def = ServiceDefinition::new("web", ServiceKind::Simple, "  ");
        assert!(matches!(
            validate_definition(&def, "web.service"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn accepts_valid_definition() {
        let def = ServiceDefinition::new("dhcpcd", ServiceKind::Forking, "dhcpcd -q")
            .with_provides(["net"])
            .with_needs(["udev.settled"]);
        assert!(validate_definition(&def, "dhcpcd.service").is_ok());
    }
}
