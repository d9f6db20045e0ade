use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("destination already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("git clone failed: {0}")]
    CloneFailed(String),

    #[error("git checkout failed: {0}")]
    CheckoutFailed(String),
}

/// Clone and branch checkout against an external version-control client.
/// Both calls wait on a child process and must only run from background
/// tasks.
#[async_trait]
pub trait VcsGateway: Send + Sync {
    /// Branch a fresh clone sits on without any checkout.
    fn default_branch(&self) -> &str;

    /// Clone `url` into `path`. Returns `AlreadyExists` without touching the
    /// disk if `path` is present. A failed clone is not cleaned up.
    async fn ensure_cloned(&self, path: &Path, url: &str) -> Result<(), GitError>;

    /// Create and switch to a local branch tracking `origin/<branch>`.
    /// No-op for the default branch.
    async fn ensure_branch(&self, path: &Path, branch: &str) -> Result<(), GitError>;
}

/// Gateway that shells out to the `git` binary.
pub struct GitCli {
    bin: String,
    default_branch: String,
    timeout: Duration,
}

impl GitCli {
    pub fn new(
        bin: impl Into<String>,
        default_branch: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            bin: bin.into(),
            default_branch: default_branch.into(),
            timeout,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.bin);
        // Never block on an interactive credential prompt.
        cmd.env("GIT_TERMINAL_PROMPT", "0").kill_on_drop(true);
        cmd
    }

    /// Run to completion within the configured timeout. The child is killed
    /// if the timeout elapses.
    async fn run(&self, mut cmd: Command) -> Result<Output, String> {
        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => Ok(output),
            Ok(Ok(output)) => Err(diagnostic(&output)),
            Ok(Err(e)) => Err(format!("failed to run {}: {e}", self.bin)),
            Err(_) => Err(format!("timed out after {:?}", self.timeout)),
        }
    }
}

fn diagnostic(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = format!("{} {}", stderr.trim(), stdout.trim());
    let text = text.trim();
    if text.is_empty() {
        format!("exited with {}", output.status)
    } else {
        text.to_owned()
    }
}

#[async_trait]
impl VcsGateway for GitCli {
    fn default_branch(&self) -> &str {
        &self.default_branch
    }

    #[tracing::instrument(skip(self), fields(path = %path.display()), err)]
    async fn ensure_cloned(&self, path: &Path, url: &str) -> Result<(), GitError> {
        if tokio::fs::try_exists(path).await.unwrap_or(true) {
            return Err(GitError::AlreadyExists(path.to_path_buf()));
        }

        let mut cmd = self.command();
        cmd.arg("clone").arg("--").arg(url).arg(path);
        self.run(cmd).await.map_err(GitError::CloneFailed)?;

        tracing::debug!(path = %path.display(), "repository cloned");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(path = %path.display()), err)]
    async fn ensure_branch(&self, path: &Path, branch: &str) -> Result<(), GitError> {
        if branch == self.default_branch {
            return Ok(());
        }

        let mut cmd = self.command();
        cmd.current_dir(path)
            .args(["checkout", "-b", branch])
            .arg(format!("origin/{branch}"))
            .arg("--");
        self.run(cmd).await.map_err(GitError::CheckoutFailed)?;

        tracing::debug!(path = %path.display(), %branch, "branch checked out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> GitCli {
        GitCli::new("git", "master", Duration::from_secs(60))
    }

    async fn git(dir: &Path, args: &[&str]) {
        let output = Command::new("git")
            .args(["-c", "user.name=test", "-c", "user.email=test@localhost"])
            .args(["-c", "init.defaultBranch=master"])
            .args(args)
            .current_dir(dir)
            .output()
            .await
            .unwrap();
        assert!(output.status.success(), "git {args:?}: {}", diagnostic(&output));
    }

    /// A local source repository with `master` and `release` branches.
    async fn source_repo(root: &Path) -> PathBuf {
        let src = root.join("src");
        tokio::fs::create_dir_all(&src).await.unwrap();
        git(&src, &["init"]).await;
        git(&src, &["commit", "--allow-empty", "-m", "init"]).await;
        git(&src, &["branch", "release"]).await;
        src
    }

    async fn current_branch(repo: &Path) -> String {
        let output = Command::new("git")
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .current_dir(repo)
            .output()
            .await
            .unwrap();
        String::from_utf8_lossy(&output.stdout).trim().to_owned()
    }

    #[tokio::test]
    async fn clone_into_existing_path_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let err = gateway()
            .ensure_cloned(tmp.path(), "https://example.invalid/repo.git")
            .await
            .unwrap_err();
        assert!(matches!(err, GitError::AlreadyExists(ref p) if p == tmp.path()));
    }

    #[tokio::test]
    async fn clone_of_missing_source_fails_with_diagnostic() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("no-such-source");
        let dest = tmp.path().join("dest");
        let err = gateway()
            .ensure_cloned(&dest, missing.to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, GitError::CloneFailed(ref msg) if !msg.is_empty()));
    }

    #[tokio::test]
    async fn default_branch_needs_no_checkout() {
        let tmp = tempfile::tempdir().unwrap();
        // Not a repository: any real git invocation here would fail.
        gateway()
            .ensure_branch(&tmp.path().join("absent"), "master")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn checkout_outside_repository_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = gateway()
            .ensure_branch(tmp.path(), "release")
            .await
            .unwrap_err();
        assert!(matches!(err, GitError::CheckoutFailed(_)));
    }

    /// A stand-in for the git binary that hangs until killed.
    #[cfg(unix)]
    fn hanging_git(dir: &Path) -> GitCli {
        use std::os::unix::fs::PermissionsExt;

        let bin = dir.join("git-hang");
        std::fs::write(&bin, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
        GitCli::new(
            bin.to_string_lossy().into_owned(),
            "master",
            Duration::from_millis(100),
        )
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_clone_times_out() {
        let tmp = tempfile::tempdir().unwrap();
        let gw = hanging_git(tmp.path());

        let started = std::time::Instant::now();
        let err = gw
            .ensure_cloned(&tmp.path().join("api"), "https://example.invalid/repo.git")
            .await
            .unwrap_err();
        assert!(matches!(err, GitError::CloneFailed(ref msg) if msg.contains("timed out")));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_checkout_times_out() {
        let tmp = tempfile::tempdir().unwrap();
        let gw = hanging_git(tmp.path());

        let err = gw.ensure_branch(tmp.path(), "release").await.unwrap_err();
        assert!(matches!(err, GitError::CheckoutFailed(ref msg) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn clone_then_checkout_tracking_branch() {
        let tmp = tempfile::tempdir().unwrap();
        let src = source_repo(tmp.path()).await;
        let dest = tmp.path().join("api");
        let gw = gateway();

        gw.ensure_cloned(&dest, src.to_str().unwrap()).await.unwrap();
        assert_eq!(current_branch(&dest).await, "master");

        gw.ensure_branch(&dest, "release").await.unwrap();
        assert_eq!(current_branch(&dest).await, "release");
    }

    #[tokio::test]
    async fn checkout_of_unknown_branch_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let src = source_repo(tmp.path()).await;
        let dest = tmp.path().join("api");
        let gw = gateway();

        gw.ensure_cloned(&dest, src.to_str().unwrap()).await.unwrap();
        let err = gw.ensure_branch(&dest, "nope").await.unwrap_err();
        assert!(matches!(err, GitError::CheckoutFailed(ref msg) if msg.contains("nope")));
    }
}
