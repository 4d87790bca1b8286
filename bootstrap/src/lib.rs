// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kea-Bootstrap: host bootstrapper for the ansible-vpn playbook
//!
//! Prepares a fresh Debian- or RPM-family host, checks out the playbook,
//! provisions its Python runtime, gathers the operator's settings and hands
//! over to `ansible-playbook`.
//!
//! # Stages
//!
//! * **Probe:** distribution family, architecture, sudo requirements, cloud metadata
//! * **Prepare:** family-specific package installation
//! * **Fetch / Runtime:** playbook checkout, virtualenv, pip and galaxy requirements
//! * **Certificates:** non-interactive certbot run
//! * **Collect / Launch:** interactive settings, vault encryption, playbook run

pub mod certs;
pub mod collect;
pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod launch;
pub mod pipeline;
pub mod prepare;
pub mod probe;
pub mod prompt;
pub mod runner;
pub mod runtime;
pub mod workspace;

pub use config::Config;
pub use error::{BootstrapError, Result};
pub use pipeline::{Bootstrap, BootstrapReport, Outcome};
