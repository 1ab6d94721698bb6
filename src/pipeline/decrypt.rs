//! Password removal, delegated to `qpdf`.
//!
//! The controller sees only the [`Decryptor`] trait: given an input file,
//! a destination and a candidate password, either a decrypted copy exists
//! at the destination afterwards or a [`DecryptFailure`] explains why not.
//! Nothing escapes the boundary as a panic or a different error type.
//!
//! ## Invocation
//!
//! ```text
//! qpdf --decrypt --password-file=- <input> <output>
//! ```
//!
//! The password is written to the child's stdin rather than passed on the
//! command line, where any local user could read it from the process list.
//! The child is spawned with `kill_on_drop`, so when the timeout elapses
//! and the wait future is dropped the process is killed as well.
//!
//! ## Exit status
//!
//! qpdf exits 0 on success, 2 on error and 3 when it succeeded with
//! warnings. Exit 3 counts as success only if the output file exists.

use crate::directive::Password;
use crate::error::{DecryptFailure, FailureReason};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Removes the password from a PDF.
#[async_trait]
pub trait Decryptor: Send + Sync {
    async fn unlock(
        &self,
        input: &Path,
        output: &Path,
        password: &Password,
    ) -> Result<(), DecryptFailure>;
}

/// [`Decryptor`] backed by the `qpdf` command-line tool.
#[derive(Debug, Clone)]
pub struct QpdfDecryptor {
    program: PathBuf,
    timeout: Duration,
}

impl QpdfDecryptor {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    async fn run(
        &self,
        input: &Path,
        output: &Path,
        password: &Password,
    ) -> Result<(), DecryptFailure> {
        let mut child = Command::new(&self.program)
            .arg("--decrypt")
            .arg("--password-file=-")
            .arg(input)
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DecryptFailure::new(
                    FailureReason::Other,
                    format!("could not start {}: {}", self.program.display(), e),
                )
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // qpdf reads the first line; a child that exits without reading
            // closes the pipe, which is reported through its exit status.
            let line = format!("{}\n", password.expose());
            if let Err(e) = stdin.write_all(line.as_bytes()).await {
                debug!("qpdf stdin closed early: {}", e);
            }
        }

        let out = child.wait_with_output().await.map_err(|e| {
            DecryptFailure::new(FailureReason::Other, format!("waiting for qpdf failed: {e}"))
        })?;

        let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
        match out.status.code() {
            Some(0) => Ok(()),
            Some(3) if tokio::fs::try_exists(output).await.unwrap_or(false) => {
                debug!("qpdf finished with warnings: {}", stderr);
                Ok(())
            }
            code => {
                let detail = if stderr.is_empty() {
                    match code {
                        Some(c) => format!("qpdf exited with status {c}"),
                        None => "qpdf was terminated by a signal".to_string(),
                    }
                } else {
                    stderr
                };
                Err(DecryptFailure::new(classify_failure(&detail), detail))
            }
        }
    }
}

#[async_trait]
impl Decryptor for QpdfDecryptor {
    async fn unlock(
        &self,
        input: &Path,
        output: &Path,
        password: &Password,
    ) -> Result<(), DecryptFailure> {
        info!("Decrypting '{}'", input.display());
        let attempt = self.run(input, output, password);
        let result = match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(DecryptFailure::new(
                FailureReason::Other,
                format!("qpdf timed out after {}s", self.timeout.as_secs_f32()),
            )),
        };

        match &result {
            Ok(()) => info!("Decrypted '{}' to '{}'", input.display(), output.display()),
            Err(f) => warn!("Could not decrypt '{}': {}", input.display(), f),
        }
        result
    }
}

const PASSWORD_MARKERS: &[&str] = &[
    "invalid password",
    "password supplied is incorrect",
    "password required",
];

const UNREADABLE_MARKERS: &[&str] = &[
    "unable to open",
    "can't find pdf header",
    "not a pdf",
    "file is damaged",
    "no such file",
];

/// Map qpdf's diagnostic text onto a [`FailureReason`].
pub fn classify_failure(message: &str) -> FailureReason {
    let lower = message.to_lowercase();
    if PASSWORD_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureReason::WrongOrMissingPassword
    } else if UNREADABLE_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureReason::CorruptOrUnreadableInput
    } else {
        FailureReason::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_password_errors() {
        assert_eq!(
            classify_failure("qpdf: in.pdf: invalid password"),
            FailureReason::WrongOrMissingPassword
        );
        assert_eq!(
            classify_failure("The password supplied is incorrect"),
            FailureReason::WrongOrMissingPassword
        );
        assert_eq!(
            classify_failure("Password required"),
            FailureReason::WrongOrMissingPassword
        );
    }

    #[test]
    fn classify_unreadable_input() {
        assert_eq!(
            classify_failure(
                "qpdf: x.pdf: unable to find trailer dictionary while recovering \
                 damaged file; can't find PDF header"
            ),
            FailureReason::CorruptOrUnreadableInput
        );
        assert_eq!(
            classify_failure("open x.pdf: No such file or directory"),
            FailureReason::CorruptOrUnreadableInput
        );
    }

    #[test]
    fn classify_other() {
        assert_eq!(classify_failure("qpdf exited with status 2"), FailureReason::Other);
        assert_eq!(classify_failure(""), FailureReason::Other);
    }

    #[tokio::test]
    async fn missing_program_is_other() {
        let dir = tempfile::TempDir::new().unwrap();
        let d = QpdfDecryptor::new(
            dir.path().join("no-such-qpdf"),
            Duration::from_secs(5),
        );
        let err = d
            .unlock(
                &dir.path().join("in.pdf"),
                &dir.path().join("out.pdf"),
                &Password::new("x"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.reason, FailureReason::Other);
        assert!(err.detail.contains("could not start"), "got: {}", err.detail);
    }

    #[cfg(unix)]
    mod stub {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        /// Write an executable shell script standing in for qpdf. The
        /// script sees the same argv qpdf would: `$3` input, `$4` output.
        fn stub(dir: &TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("fake-qpdf");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            let mut perms = std::fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
            path
        }

        async fn unlock_with(
            body: &str,
            password: &str,
            timeout: Duration,
        ) -> (TempDir, Result<(), DecryptFailure>) {
            let dir = TempDir::new().unwrap();
            let program = stub(&dir, body);
            let input = dir.path().join("in.pdf");
            std::fs::write(&input, b"%PDF-1.7 locked").unwrap();
            let output = dir.path().join("out.pdf");
            let result = QpdfDecryptor::new(program, timeout)
                .unlock(&input, &output, &Password::new(password))
                .await;
            (dir, result)
        }

        const CHECKS_PASSWORD: &str = r#"read pw
if [ "$pw" = "correctpass" ]; then
  cp "$3" "$4"
  exit 0
fi
echo "qpdf: $3: invalid password" >&2
exit 2"#;

        #[tokio::test]
        async fn correct_password_writes_output() {
            let (dir, result) =
                unlock_with(CHECKS_PASSWORD, "correctpass", Duration::from_secs(10)).await;
            result.unwrap();
            assert_eq!(
                std::fs::read(dir.path().join("out.pdf")).unwrap(),
                b"%PDF-1.7 locked"
            );
        }

        #[tokio::test]
        async fn wrong_password_is_classified() {
            let (dir, result) = unlock_with(CHECKS_PASSWORD, "nope", Duration::from_secs(10)).await;
            let err = result.unwrap_err();
            assert_eq!(err.reason, FailureReason::WrongOrMissingPassword);
            assert!(!dir.path().join("out.pdf").exists());
        }

        #[tokio::test]
        async fn warnings_with_output_succeed() {
            let body = "cat >/dev/null\ncp \"$3\" \"$4\"\necho 'WARNING: recovered' >&2\nexit 3";
            let (_dir, result) = unlock_with(body, "pw", Duration::from_secs(10)).await;
            result.unwrap();
        }

        #[tokio::test]
        async fn warnings_without_output_fail() {
            let body = "cat >/dev/null\nexit 3";
            let (_dir, result) = unlock_with(body, "pw", Duration::from_secs(10)).await;
            let err = result.unwrap_err();
            assert_eq!(err.reason, FailureReason::Other);
            assert!(err.detail.contains("status 3"), "got: {}", err.detail);
        }

        #[tokio::test]
        async fn damaged_input_is_classified() {
            let body = "cat >/dev/null\necho \"qpdf: $3: not a PDF file\" >&2\nexit 2";
            let (_dir, result) = unlock_with(body, "pw", Duration::from_secs(10)).await;
            assert_eq!(
                result.unwrap_err().reason,
                FailureReason::CorruptOrUnreadableInput
            );
        }

        #[tokio::test]
        async fn hang_times_out_as_other() {
            let (_dir, result) = unlock_with("sleep 30", "pw", Duration::from_millis(300)).await;
            let err = result.unwrap_err();
            assert_eq!(err.reason, FailureReason::Other);
            assert!(err.detail.contains("timed out"), "got: {}", err.detail);
        }
    }
}
