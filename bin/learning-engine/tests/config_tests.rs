// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use anyhow::Result;
use learning_engine::config::ConfigLoader;
use ledger::LedgerBackend;
use std::collections::HashMap;
use std::io::Write;

#[test]
fn test_file_environment_and_port_layering() -> Result<()> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    writeln!(
        file,
        r#"
[server]
port = 6000
body_limit_bytes = 1024

[ledger]
backend = "memory"

[adaptation.thresholds]
frustrated = 0.4
"#
    )?;

    let config = ConfigLoader::new()
        .with_path(Some(file.path().to_path_buf()))
        .with_env(HashMap::new())
        .load()?;
    assert_eq!(config.server.port, 6000);
    assert_eq!(config.server.body_limit_bytes, 1024);
    assert_eq!(config.ledger.backend, LedgerBackend::Memory);
    assert_eq!(config.adaptation.thresholds.frustrated, 0.4);
    assert_eq!(config.adaptation.thresholds.bored, 0.6);

    let env = HashMap::from([
        ("LE__ESTIMATOR__COLLAPSE_THRESHOLD".to_string(), "0.5".to_string()),
        ("PORT".to_string(), "7000".to_string()),
    ]);
    let config = ConfigLoader::new()
        .with_path(Some(file.path().to_path_buf()))
        .with_env(env)
        .load()?;
    assert_eq!(config.server.port, 7000);
    assert_eq!(config.estimator.collapse_threshold, 0.5);
    Ok(())
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let result = ConfigLoader::new()
        .with_path(Some("/nonexistent/learning-engine.toml".into()))
        .with_env(HashMap::new())
        .load();
    assert!(result.is_err());
}
