//! Account Configuration Blob
//!
//! Each account stores its connection settings as an ini-style blob:
//!
//! ```ini
//! [MT4]
//! Login = 12345
//! Password = secret
//! Server = demo.broker.com
//! Port = 443
//!
//! [Account]
//! Name = Demo
//! ```
//!
//! Section and key names match case-insensitively. `Port` defaults to 443 and
//! `Name` to an empty string.

use std::path::Path;

use ::config::{Config, File, FileFormat, Map, Value};

use super::settings::ConfigError;
use crate::domain::account::{AccountCredentials, AccountId};

const SERVER_SECTION: &str = "MT4";
const ACCOUNT_SECTION: &str = "Account";

/// Port used when the blob does not name one.
pub const DEFAULT_SERVER_PORT: u16 = 443;

/// Parse an account blob into credentials.
///
/// # Errors
///
/// Returns an error if the blob is not valid ini, a required key is missing,
/// `Login` is not a positive integer, `Server` is empty, or `Port` is not a
/// valid port number.
pub fn parse_account_ini(account_id: AccountId, blob: &str) -> Result<AccountCredentials, ConfigError> {
    let sections: Map<String, Value> = Config::builder()
        .add_source(File::from_str(blob, FileFormat::Ini))
        .build()?
        .try_deserialize()?;

    let server = section(&sections, SERVER_SECTION)?;

    let raw_login = required_key(&server, SERVER_SECTION, "Login")?;
    let login = raw_login
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|login| *login > 0)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: "MT4.Login".to_string(),
            reason: format!("'{raw_login}' is not a positive integer"),
        })?;

    let password = required_key(&server, SERVER_SECTION, "Password")?;

    let host = required_key(&server, SERVER_SECTION, "Server")?;
    let host = host.trim();
    if host.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "MT4.Server".to_string(),
            reason: "server host cannot be empty".to_string(),
        });
    }

    let port = match find_key(&server, "Port")? {
        None => DEFAULT_SERVER_PORT,
        Some(raw) => raw
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|port| *port > 0)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "MT4.Port".to_string(),
                reason: format!("'{raw}' is not a valid port"),
            })?,
    };

    let display_name = match section(&sections, ACCOUNT_SECTION) {
        Ok(account) => find_key(&account, "Name")?.unwrap_or_default(),
        Err(ConfigError::MissingKey(_)) => String::new(),
        Err(e) => return Err(e),
    };

    Ok(AccountCredentials::new(
        account_id,
        login,
        password,
        host,
        port,
        display_name.trim(),
    ))
}

/// Read an account blob from disk and parse it.
///
/// # Errors
///
/// Returns an error if the file cannot be read or its content is invalid.
pub fn load_account_file(
    account_id: AccountId,
    path: impl AsRef<Path>,
) -> Result<AccountCredentials, ConfigError> {
    let path = path.as_ref();
    let blob = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_account_ini(account_id, &blob)
}

fn section(sections: &Map<String, Value>, name: &str) -> Result<Map<String, Value>, ConfigError> {
    sections
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.clone().into_table())
        .transpose()?
        .ok_or_else(|| ConfigError::MissingKey(format!("[{name}]")))
}

fn find_key(section: &Map<String, Value>, name: &str) -> Result<Option<String>, ConfigError> {
    section
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.clone().into_string())
        .transpose()
        .map_err(ConfigError::from)
}

fn required_key(
    section: &Map<String, Value>,
    section_name: &str,
    name: &str,
) -> Result<String, ConfigError> {
    find_key(section, name)?.ok_or_else(|| ConfigError::MissingKey(format!("{section_name}.{name}")))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const DEMO_BLOB: &str = "\
[MT4]
Login = 12345
Password = hunter2
Server = demo.broker.com
Port = 444

[Account]
Name = Demo
";

    #[test]
    fn parses_full_blob() {
        let creds = parse_account_ini(AccountId::new(7), DEMO_BLOB).unwrap();
        assert_eq!(creds.account_id(), AccountId::new(7));
        assert_eq!(creds.login(), 12345);
        assert_eq!(creds.password(), "hunter2");
        assert_eq!(creds.host(), "demo.broker.com");
        assert_eq!(creds.port(), 444);
        assert_eq!(creds.display_name(), "Demo");
    }

    #[test]
    fn port_defaults_to_443() {
        let blob = "[MT4]\nLogin=1\nPassword=p\nServer=demo.broker.com\n[Account]\nName=Demo\n";
        let creds = parse_account_ini(AccountId::new(1), blob).unwrap();
        assert_eq!(creds.port(), DEFAULT_SERVER_PORT);
    }

    #[test]
    fn section_and_key_names_are_case_insensitive() {
        let blob = "[mt4]\nlogin=99\nPASSWORD=p\nserver=h\n[account]\nname=Lower\n";
        let creds = parse_account_ini(AccountId::new(1), blob).unwrap();
        assert_eq!(creds.login(), 99);
        assert_eq!(creds.host(), "h");
        assert_eq!(creds.display_name(), "Lower");
    }

    #[test]
    fn missing_account_section_leaves_name_empty() {
        let blob = "[MT4]\nLogin=1\nPassword=p\nServer=h\n";
        let creds = parse_account_ini(AccountId::new(1), blob).unwrap();
        assert_eq!(creds.display_name(), "");
    }

    #[test]
    fn rejects_missing_server_section() {
        let err = parse_account_ini(AccountId::new(1), "[Account]\nName=x\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(ref k) if k == "[MT4]"));
    }

    #[test]
    fn rejects_zero_login() {
        let blob = "[MT4]\nLogin=0\nPassword=p\nServer=h\n";
        let err = parse_account_ini(AccountId::new(1), blob).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MT4.Login"));
    }

    #[test]
    fn rejects_non_numeric_port() {
        let blob = "[MT4]\nLogin=1\nPassword=p\nServer=h\nPort=https\n";
        let err = parse_account_ini(AccountId::new(1), blob).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MT4.Port"));
    }

    #[test]
    fn rejects_missing_password() {
        let blob = "[MT4]\nLogin=1\nServer=h\n";
        let err = parse_account_ini(AccountId::new(1), blob).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(ref k) if k == "MT4.Password"));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DEMO_BLOB.as_bytes()).unwrap();

        let creds = load_account_file(AccountId::new(3), file.path()).unwrap();
        assert_eq!(creds.login(), 12345);
        assert_eq!(creds.account_id(), AccountId::new(3));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_account_file(AccountId::new(3), dir.path().join("absent.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
