// SPDX-License-Identifier: AGPL-3.0-or-later
//! Certificate issuance check
//!
//! Runs certbot non-interactively for the root domain and the two service
//! subdomains. Existing certificates are deliberately broken and renewed.

use tracing::info;

use crate::context::Context;
use crate::error::Result;

/// Subdomains that need a certificate next to the root domain
pub const SUBDOMAINS: [&str; 2] = ["wg", "auth"];

/// Parameters of one certbot run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    /// Root domain, e.g. `vpn.example.org`
    pub root_host: String,
    /// Contact e-mail registered with the issuer
    pub email: String,
    /// Target the issuer's staging endpoint
    pub staging: bool,
}

impl CertificateRequest {
    /// Every domain the certificate must cover
    pub fn domains(&self) -> Vec<String> {
        std::iter::once(self.root_host.clone())
            .chain(SUBDOMAINS.iter().map(|sub| format!("{}.{}", sub, self.root_host)))
            .collect()
    }

    /// certbot arguments after the program name
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "certonly",
            "--non-interactive",
            "--break-my-certs",
            "--force-renewal",
            "--agree-tos",
            "--email",
            self.email.as_str(),
            "--standalone",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if self.staging {
            args.push("--staging".to_string());
        }

        for domain in self.domains() {
            args.push("-d".to_string());
            args.push(domain);
        }
        args
    }
}

/// Run certbot from the workspace venv
pub async fn validate_certificate(ctx: &Context<'_>, request: &CertificateRequest) -> Result<()> {
    info!(
        domain = %request.root_host,
        staging = request.staging,
        "Requesting certificates"
    );

    let certbot = ctx
        .workspace_command(ctx.workspace.certbot())
        .args(request.to_args())
        .elevated(&ctx.elevation);
    ctx.runner.run(&certbot).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Elevation;
    use crate::runner::RecordingRunner;
    use crate::workspace::Workspace;

    fn request(staging: bool) -> CertificateRequest {
        CertificateRequest {
            root_host: "example.com".to_string(),
            email: "root@localhost.com".to_string(),
            staging,
        }
    }

    #[test]
    fn test_domains() {
        assert_eq!(
            request(false).domains(),
            vec!["example.com", "wg.example.com", "auth.example.com"]
        );
    }

    #[test]
    fn test_staging_flag_follows_feature_flag() {
        assert!(request(true).to_args().contains(&"--staging".to_string()));

        let args = request(false).to_args();
        assert!(!args.contains(&"--staging".to_string()));
        assert!(args.iter().all(|a| !a.is_empty()));
    }

    #[tokio::test]
    async fn test_certbot_invocation() {
        let runner = RecordingRunner::new();
        let ctx = Context::new(
            &runner,
            Workspace::new("/home/kea/ansible-vpn"),
            Elevation::for_user(false, false),
        );

        validate_certificate(&ctx, &request(true)).await.unwrap();

        let calls = runner.invocations();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].to_string(),
            "sudo -E .venv/bin/certbot certonly --non-interactive --break-my-certs \
             --force-renewal --agree-tos --email root@localhost.com --standalone --staging \
             -d example.com -d wg.example.com -d auth.example.com"
        );
        assert_eq!(
            calls[0].cwd().map(|p| p.to_path_buf()),
            Some(std::path::PathBuf::from("/home/kea/ansible-vpn"))
        );
    }

    #[tokio::test]
    async fn test_certbot_failure_is_fatal() {
        let runner = RecordingRunner::new().failing_on("certbot");
        let ctx = Context::new(&runner, Workspace::new("/tmp/ws"), Elevation::None);
        assert!(validate_certificate(&ctx, &request(false)).await.is_err());
    }
}
