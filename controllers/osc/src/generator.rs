//! Provisioning data generation.
//!
//! Turns a rendered OperatingSystemConfig into the payload node bootstrap
//! agents consume. The default generator emits a `#cloud-config` document.

use crds::OperatingSystemConfig;
use serde::Serialize;
use thiserror::Error;

/// Directory systemd units are written to
const SYSTEMD_UNIT_DIR: &str = "/etc/systemd/system";

/// Errors raised while generating provisioning data.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// File path is not absolute
    #[error("file path {0:?} is not absolute")]
    InvalidPath(String),

    /// Permissions are not an octal file mode
    #[error("file {path} has invalid permissions {permissions}")]
    InvalidPermissions {
        /// File path
        path: String,
        /// Offending value
        permissions: u32,
    },

    /// Unit name is empty or contains a path separator
    #[error("invalid unit name {0:?}")]
    InvalidUnitName(String),

    /// Document serialization failed
    #[error("failed to serialize cloud-config: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// Produces the bootstrap payload for an OperatingSystemConfig.
pub trait ConfigGenerator: Send + Sync {
    /// Generates the payload. Never returns a partial payload.
    fn generate(&self, osc: &OperatingSystemConfig) -> Result<Vec<u8>, GeneratorError>;
}

/// cloud-init `#cloud-config` generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudInitGenerator;

#[derive(Debug, Serialize)]
struct CloudInit<'a> {
    write_files: Vec<WriteFile<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    runcmd: Vec<String>,
}

#[derive(Debug, Serialize)]
struct WriteFile<'a> {
    path: String,
    permissions: String,
    content: &'a str,
}

/// Octal mode string (`644` -> `"0644"`).
fn file_mode(path: &str, permissions: u32) -> Result<String, GeneratorError> {
    let mode = format!("{:04}", permissions);
    if mode.len() > 4 || mode.chars().any(|c| !('0'..='7').contains(&c)) {
        return Err(GeneratorError::InvalidPermissions {
            path: path.to_string(),
            permissions,
        });
    }
    Ok(mode)
}

impl ConfigGenerator for CloudInitGenerator {
    fn generate(&self, osc: &OperatingSystemConfig) -> Result<Vec<u8>, GeneratorError> {
        let mut write_files = Vec::with_capacity(osc.spec.files.len() + osc.spec.units.len());
        for file in &osc.spec.files {
            if !file.path.starts_with('/') {
                return Err(GeneratorError::InvalidPath(file.path.clone()));
            }
            write_files.push(WriteFile {
                path: file.path.clone(),
                permissions: file_mode(&file.path, file.permissions)?,
                content: &file.content,
            });
        }

        let mut runcmd = Vec::new();
        for unit in &osc.spec.units {
            if unit.name.is_empty() || unit.name.contains('/') {
                return Err(GeneratorError::InvalidUnitName(unit.name.clone()));
            }
            if let Some(content) = &unit.content {
                write_files.push(WriteFile {
                    path: format!("{}/{}", SYSTEMD_UNIT_DIR, unit.name),
                    permissions: "0644".to_string(),
                    content,
                });
            }
            if unit.enable {
                runcmd.push(format!("systemctl enable --now {}", unit.name));
            }
        }
        if !osc.spec.units.is_empty() {
            runcmd.insert(0, "systemctl daemon-reload".to_string());
        }

        let document = serde_yaml::to_string(&CloudInit { write_files, runcmd })?;
        Ok(format!("#cloud-config\n{}", document).into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{File, OperatingSystemConfigSpec, Unit};

    fn osc(files: Vec<File>, units: Vec<Unit>) -> OperatingSystemConfig {
        OperatingSystemConfig::new(
            "md-1-ns-a-provisioning",
            OperatingSystemConfigSpec {
                os_name: "ubuntu".to_string(),
                os_version: "22.04".to_string(),
                files,
                units,
                ..Default::default()
            },
        )
    }

    fn file(path: &str, permissions: u32, content: &str) -> File {
        File {
            path: path.to_string(),
            permissions,
            content: content.to_string(),
        }
    }

    fn parse(payload: &[u8]) -> serde_yaml::Value {
        let text = std::str::from_utf8(payload).unwrap();
        assert!(text.starts_with("#cloud-config\n"));
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_generates_cloud_config() {
        let input = osc(
            vec![file("/opt/bin/setup", 755, "#!/bin/bash\necho ok\n")],
            vec![
                Unit {
                    name: "kubelet.service".to_string(),
                    enable: true,
                    content: Some("[Service]\nExecStart=/opt/bin/kubelet\n".to_string()),
                },
                Unit {
                    name: "containerd.service".to_string(),
                    enable: true,
                    content: None,
                },
            ],
        );

        let document = parse(&CloudInitGenerator.generate(&input).unwrap());

        let files = document["write_files"].as_sequence().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0]["path"], "/opt/bin/setup");
        assert_eq!(files[0]["permissions"], "0755");
        assert_eq!(files[0]["content"], "#!/bin/bash\necho ok\n");
        assert_eq!(files[1]["path"], "/etc/systemd/system/kubelet.service");

        let runcmd: Vec<&str> = document["runcmd"].as_sequence().unwrap().iter().map(|c| c.as_str().unwrap()).collect();
        assert_eq!(
            runcmd,
            vec![
                "systemctl daemon-reload",
                "systemctl enable --now kubelet.service",
                "systemctl enable --now containerd.service",
            ]
        );
    }

    #[test]
    fn test_generation_is_deterministic_and_pure() {
        let input = osc(vec![file("/etc/motd", 644, "hello")], vec![]);
        let before = input.clone();

        let first = CloudInitGenerator.generate(&input).unwrap();
        let second = CloudInitGenerator.generate(&input).unwrap();

        assert_eq!(first, second);
        assert_eq!(input, before);
        assert!(parse(&first).get("runcmd").is_none());
    }

    #[test]
    fn test_rejects_relative_path() {
        let input = osc(vec![file("etc/motd", 644, "hello")], vec![]);
        assert!(matches!(CloudInitGenerator.generate(&input), Err(GeneratorError::InvalidPath(_))));
    }

    #[test]
    fn test_rejects_invalid_permissions() {
        let input = osc(vec![file("/etc/motd", 689, "hello")], vec![]);
        assert!(matches!(
            CloudInitGenerator.generate(&input),
            Err(GeneratorError::InvalidPermissions { permissions: 689, .. })
        ));
        assert_eq!(file_mode("/x", 600).unwrap(), "0600");
        assert!(file_mode("/x", 17777).is_err());
    }

    #[test]
    fn test_rejects_unit_with_path() {
        let input = osc(
            vec![],
            vec![Unit {
                name: "../evil.service".to_string(),
                enable: true,
                content: None,
            }],
        );
        assert!(matches!(CloudInitGenerator.generate(&input), Err(GeneratorError::InvalidUnitName(_))));
    }
}
