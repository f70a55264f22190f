//! `sfdx` CLI implementation of [`MetadataTool`].

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::process::Command;

use super::{MdapiDeploy, MdapiRetrieve, MetadataTool, SourceDeploy, SourceRetrieve, TargetOrg};
use crate::error::{ToolError, ToolFailure};

const DEFAULT_ARCHIVE: &str = "unpackaged.zip";

/// Runs the `sfdx` executable as a child process per operation.
///
/// Every call sets its working directory explicitly; the process-wide
/// current directory is never changed.
#[derive(Debug, Clone)]
pub struct SfdxTool {
    program: String,
}

/// `--json` envelope printed by every sfdx command.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    status: i32,
    result: Option<T>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConvertResult {
    location: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrgDisplayResult {
    api_version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MdapiRetrieveResult {
    zip_file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourceRetrieveResult {
    inbound_files: Vec<InboundFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InboundFile {
    file_path: String,
}

struct Captured {
    command: String,
    stdout: String,
}

impl SfdxTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command_line(&self, args: &[String]) -> String {
        let mut line = self.program.clone();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Run the tool and capture stdout; a non-zero exit becomes [`ToolError::Failed`].
    async fn run(&self, args: Vec<String>, cwd: &Path) -> Result<Captured, ToolError> {
        let command = self.command_line(&args);
        tracing::debug!(command = %command, cwd = %cwd.display(), "running tool");

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(cwd)
            .output()
            .await
            .map_err(|source| ToolError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            return Err(ToolFailure {
                command,
                status: output.status.code(),
                stdout,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .into());
        }
        Ok(Captured { command, stdout })
    }

    /// Run a `--json` command and decode its `result` payload.
    async fn run_json<T: DeserializeOwned>(
        &self,
        args: Vec<String>,
        cwd: &Path,
    ) -> Result<T, ToolError> {
        let captured = self.run(args, cwd).await?;
        parse_result(&captured.command, &captured.stdout)
    }
}

fn parse_result<T: DeserializeOwned>(command: &str, stdout: &str) -> Result<T, ToolError> {
    // Tolerate banner or warning lines printed ahead of the JSON document.
    let json = stdout.find('{').map(|start| &stdout[start..]).unwrap_or(stdout);
    let envelope: Envelope<T> = serde_json::from_str(json).map_err(|e| ToolError::Output {
        command: command.to_string(),
        reason: format!("invalid JSON ({}): {}", e, stdout.trim()),
    })?;

    if envelope.status != 0 {
        return Err(ToolFailure {
            command: command.to_string(),
            status: Some(envelope.status),
            stdout: envelope.message.unwrap_or_else(|| stdout.trim().to_string()),
            stderr: String::new(),
        }
        .into());
    }

    envelope.result.ok_or_else(|| ToolError::Output {
        command: command.to_string(),
        reason: "missing `result` field".to_string(),
    })
}

fn target_args(target: &TargetOrg, flag: &str) -> Vec<String> {
    match &target.username {
        Some(username) => vec![flag.to_string(), username.clone()],
        None => Vec::new(),
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn resolve(cwd: &Path, reported: &str) -> PathBuf {
    let path = Path::new(reported);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

impl MetadataTool for SfdxTool {
    async fn api_version(&self, target: &TargetOrg, cwd: &Path) -> Result<String, ToolError> {
        let mut args = vec!["force:org:display".to_string(), "--json".to_string()];
        args.extend(target_args(target, "--targetusername"));
        let result: OrgDisplayResult = self.run_json(args, cwd).await?;
        Ok(result.api_version)
    }

    async fn convert(&self, project_dir: &Path) -> Result<PathBuf, ToolError> {
        let args = vec!["force:source:convert".to_string(), "--json".to_string()];
        let result: ConvertResult = self.run_json(args, project_dir).await?;
        Ok(resolve(project_dir, &result.location))
    }

    async fn deploy(&self, request: &MdapiDeploy<'_>) -> Result<(), ToolError> {
        let mut args = vec![
            "force:mdapi:deploy".to_string(),
            "--deploydir".to_string(),
            path_arg(request.deploy_dir),
        ];
        if request.validate_only {
            args.push("-c".to_string());
        }
        args.extend(target_args(request.target, "--targetusername"));
        args.push("--wait".to_string());
        args.push(request.wait.to_string());

        let captured = self.run(args, request.cwd).await?;
        tracing::debug!(command = %captured.command, output = %captured.stdout.trim(), "deploy finished");
        Ok(())
    }

    async fn deploy_source(&self, request: &SourceDeploy<'_>) -> Result<(), ToolError> {
        let mut args = vec![
            "force:source:deploy".to_string(),
            "-p".to_string(),
            path_arg(request.source_path),
            "--json".to_string(),
            "--wait".to_string(),
            request.wait.to_string(),
        ];
        args.extend(target_args(request.target, "--targetusername"));

        let _: serde_json::Value = self.run_json(args, request.cwd).await?;
        Ok(())
    }

    async fn retrieve(&self, request: &MdapiRetrieve<'_>) -> Result<PathBuf, ToolError> {
        let mut args = vec![
            "force:mdapi:retrieve".to_string(),
            "-k".to_string(),
            path_arg(request.manifest),
            "-r".to_string(),
            path_arg(request.output_dir),
            "-w".to_string(),
            request.wait.to_string(),
        ];
        args.extend(target_args(request.target, "-u"));
        args.push("--json".to_string());

        let command = self.command_line(&args);
        let result: MdapiRetrieveResult = self.run_json(args, request.cwd).await?;
        let archive = match result.zip_file_path {
            Some(path) => resolve(request.cwd, &path),
            None => request.output_dir.join(DEFAULT_ARCHIVE),
        };
        if !archive.is_file() {
            return Err(ToolError::Output {
                command,
                reason: format!("archive not found at {}", archive.display()),
            });
        }
        Ok(archive)
    }

    async fn retrieve_source(&self, request: &SourceRetrieve<'_>) -> Result<PathBuf, ToolError> {
        let mut args = vec![
            "force:source:retrieve".to_string(),
            "-m".to_string(),
            request.metadata_arg(),
            "--wait".to_string(),
            request.wait.to_string(),
        ];
        args.extend(target_args(request.target, "--targetusername"));
        args.push("--json".to_string());

        let command = self.command_line(&args);
        let result: SourceRetrieveResult = self.run_json(args, request.cwd).await?;
        let first = result
            .inbound_files
            .into_iter()
            .next()
            .ok_or_else(|| ToolError::Output {
                command,
                reason: "no files were retrieved".to_string(),
            })?;
        Ok(resolve(request.cwd, &first.file_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_convert_location() {
        let stdout = r#"{"status":0,"result":{"location":"/tmp/stage/metadataPackage_1700000000000"}}"#;
        let result: ConvertResult = parse_result("sfdx force:source:convert", stdout).unwrap();
        assert_eq!(result.location, "/tmp/stage/metadataPackage_1700000000000");
    }

    #[test]
    fn skips_leading_warning_lines() {
        let stdout = "Warning: update available\n{\"status\":0,\"result\":{\"apiVersion\":\"58.0\"}}";
        let result: OrgDisplayResult = parse_result("sfdx force:org:display", stdout).unwrap();
        assert_eq!(result.api_version, "58.0");
    }

    #[test]
    fn nonzero_status_in_envelope_is_failure() {
        let stdout = r#"{"status":1,"name":"NoOrgFound","message":"No org configuration found"}"#;
        let err = parse_result::<ConvertResult>("sfdx force:org:display", stdout).unwrap_err();
        assert!(matches!(err, ToolError::Failed(_)));
        assert!(err.to_string().contains("No org configuration found"));
    }

    #[test]
    fn garbage_output_is_output_error() {
        let err = parse_result::<ConvertResult>("sfdx force:source:convert", "boom").unwrap_err();
        assert!(matches!(err, ToolError::Output { .. }));
    }

    #[test]
    fn parses_first_inbound_file() {
        let stdout = r#"{"status":0,"result":{"inboundFiles":[{"state":"Add","fullName":"Account","type":"CustomObject","filePath":"tempModule/main/default/objects/Account/Account.object-meta.xml"}]}}"#;
        let result: SourceRetrieveResult = parse_result("sfdx", stdout).unwrap();
        assert_eq!(
            result.inbound_files[0].file_path,
            "tempModule/main/default/objects/Account/Account.object-meta.xml"
        );
    }

    #[test]
    fn target_args_omitted_without_username() {
        assert!(target_args(&TargetOrg::default(), "-u").is_empty());
        assert_eq!(
            target_args(&TargetOrg::new(Some("me@example.com".into())), "-u"),
            vec!["-u".to_string(), "me@example.com".to_string()]
        );
    }

    #[test]
    fn relative_locations_resolve_against_cwd() {
        assert_eq!(
            resolve(Path::new("/stage"), "metadataPackage_1"),
            PathBuf::from("/stage/metadataPackage_1")
        );
        assert_eq!(resolve(Path::new("/stage"), "/abs/pkg"), PathBuf::from("/abs/pkg"));
    }
}
