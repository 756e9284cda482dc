//! `dockwire credentials ...`

use crate::cli::{CredentialsCommand, HelperArg};
use anyhow::{anyhow, Context, Result};
use dockwire_client::{DockerClient, DockerConfigFile};
use dockwire_config::ClientConfig;
use dockwire_credentials::{CredentialStore, HelperStore};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Read;

pub fn execute(
    command: CredentialsCommand,
    config: &ClientConfig,
    env: &HashMap<String, String>,
) -> Result<Value> {
    match command {
        CredentialsCommand::Get { helper, server } => {
            let store = open(&helper, config, env)?;
            let credentials = store.get(&server)?;
            Ok(serde_json::to_value(credentials)?)
        }
        CredentialsCommand::Store {
            helper,
            server,
            username,
        } => {
            let store = open(&helper, config, env)?;
            let mut secret = String::new();
            std::io::stdin()
                .read_to_string(&mut secret)
                .context("reading secret from stdin")?;
            let secret = secret.trim_end_matches(['\r', '\n']);
            store.store(&server, &username, secret)?;
            Ok(json!({ "stored": server }))
        }
        CredentialsCommand::Erase { helper, server } => {
            open(&helper, config, env)?.erase(&server)?;
            Ok(json!({ "erased": server }))
        }
        CredentialsCommand::List { helper } => {
            let listed = open(&helper, config, env)?.list()?;
            Ok(serde_json::to_value(listed)?)
        }
        CredentialsCommand::Lookup { registry } => {
            let docker_config = DockerConfigFile::load_default(env)?;
            let client = DockerClient::new(config.clone())?.with_credstore_env(env.clone());
            match client.registry_credentials(&registry, &docker_config)? {
                Some(credentials) => Ok(serde_json::to_value(credentials)?),
                None => Ok(Value::Null),
            }
        }
    }
}

/// Pick the helper: `--helper`, then `credentials_store`, then `credsStore`
fn open(
    arg: &HelperArg,
    config: &ClientConfig,
    env: &HashMap<String, String>,
) -> Result<HelperStore> {
    let name = match (&arg.helper, &config.credentials_store) {
        (Some(name), _) | (None, Some(name)) => name.clone(),
        (None, None) => DockerConfigFile::load_default(env)?
            .creds_store
            .ok_or_else(|| anyhow!("no credential helper given; pass --helper or set credsStore"))?,
    };
    Ok(HelperStore::with_environment(&name, env.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn env_with_path(dir: &std::path::Path) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("PATH".to_string(), dir.to_string_lossy().into_owned());
        env.insert("DOCKER_CONFIG".to_string(), dir.to_string_lossy().into_owned());
        env
    }

    #[test]
    fn test_open_prefers_flag_over_config() {
        let tmp = TempDir::new().unwrap();
        let env = env_with_path(tmp.path());
        let config = ClientConfig {
            credentials_store: Some("fromconfig".to_string()),
            ..ClientConfig::default()
        };

        let flag = HelperArg {
            helper: Some("fromflag".to_string()),
        };
        assert_eq!(open(&flag, &config, &env).unwrap().program(), "docker-credential-fromflag");

        let none = HelperArg { helper: None };
        assert_eq!(open(&none, &config, &env).unwrap().program(), "docker-credential-fromconfig");
    }

    #[test]
    fn test_open_falls_back_to_creds_store() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("config.json"), r#"{"credsStore":"desktop"}"#).unwrap();
        let env = env_with_path(tmp.path());

        let store = open(&HelperArg { helper: None }, &ClientConfig::default(), &env).unwrap();
        assert_eq!(store.program(), "docker-credential-desktop");
    }

    #[test]
    fn test_open_without_any_helper_fails() {
        let tmp = TempDir::new().unwrap();
        let env = env_with_path(tmp.path());
        let err = open(&HelperArg { helper: None }, &ClientConfig::default(), &env).unwrap_err();
        assert!(err.to_string().contains("--helper"));
    }

    #[test]
    fn test_list_through_helper() {
        let tmp = TempDir::new().unwrap();
        let exe = tmp.path().join("docker-credential-listonly");
        std::fs::write(&exe, "#!/bin/sh\nprintf '{\"https://quay.io\":\"robot\"}'\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
        let env = env_with_path(tmp.path());

        let command = CredentialsCommand::List {
            helper: HelperArg {
                helper: Some("listonly".to_string()),
            },
        };
        let output = execute(command, &ClientConfig::default(), &env).unwrap();
        assert_eq!(output["https://quay.io"], "robot");
    }
}
