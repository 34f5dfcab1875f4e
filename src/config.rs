// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration: a YAML or JSON file, overridden by command-line flags,
//! validated and then frozen into an immutable `JobSpec`.

use crate::domain::delimiters::{parse_delimiter, DelimiterFormat, RequestedFormat};
use crate::domain::entities::{
    ChannelKind, Direction, DirectOptions, ExportSettings, ExportStaging, ImportPartitioning, ImportSettings,
    InputLayout, JobSpec,
};
use crate::domain::errors::{Result, TransferError};
use clap::Parser;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub job: JobConfig,
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub direct: DirectConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// Complete ODBC connection string; wins over the parts below.
    pub connection_string: Option<String>,
    pub dsn: Option<String>,
    pub driver: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    #[serde(default)]
    pub username: String,
    pub password: Option<String>,
    pub pool_size: Option<u32>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct JobConfig {
    pub job_id: Option<String>,
    pub direction: Option<Direction>,
    pub table: Option<String>,
    /// Free-form query; rejected in direct mode.
    pub query: Option<String>,
    pub schema: Option<String>,
    pub columns: Option<Vec<String>>,
    #[serde(rename = "where")]
    pub where_clause: Option<String>,
    pub partitions: Option<u32>,
    /// Retry number assigned by whatever reruns a failed job.
    pub attempt: Option<u32>,
    pub work_dir: Option<String>,
    pub pipe_open_timeout_secs: Option<u64>,
    pub channel: Option<ChannelKind>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FormatConfig {
    pub fields_terminated_by: Option<String>,
    pub escaped_by: Option<String>,
    pub enclosed_by: Option<String>,
    pub lines_terminated_by: Option<String>,
    pub null_string: Option<String>,
    pub null_non_string: Option<String>,
    pub input_fields_terminated_by: Option<String>,
    pub input_escaped_by: Option<String>,
    pub input_enclosed_by: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DirectConfig {
    pub max_errors: Option<u32>,
    pub log_dir: Option<String>,
    pub upload_dir: Option<String>,
    pub ctrl_chars: Option<bool>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ImportConfig {
    pub partitioning: Option<ImportPartitioning>,
    pub temp_table_suffix: Option<String>,
    pub delete_temp_table: Option<bool>,
    pub output_dir: Option<String>,
    pub compress: Option<bool>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExportConfig {
    pub staging: Option<ExportStaging>,
    pub temp_tables_suffix: Option<String>,
    pub delete_temp_tables: Option<bool>,
    pub input_dir: Option<String>,
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<String>,

    // Overrides for ad-hoc runs
    #[arg(long)]
    pub connection_string: Option<String>,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long, value_parser = parse_direction)]
    pub direction: Option<Direction>,
    #[arg(long)]
    pub table: Option<String>,
    #[arg(long)]
    pub schema: Option<String>,
    /// Comma-separated column list
    #[arg(long, value_delimiter = ',')]
    pub columns: Option<Vec<String>>,
    #[arg(long = "where")]
    pub where_clause: Option<String>,
    #[arg(short = 'm', long)]
    pub partitions: Option<u32>,
    #[arg(long)]
    pub attempt: Option<u32>,
    #[arg(long)]
    pub work_dir: Option<String>,
    #[arg(short, long)]
    pub output: Option<String>,
    #[arg(long)]
    pub input: Option<String>,
    #[arg(long)]
    pub fields_terminated_by: Option<String>,
    #[arg(long)]
    pub null_string: Option<String>,
    #[arg(long)]
    pub max_errors: Option<u32>,
    #[arg(long)]
    pub log_dir: Option<String>,
    #[arg(long)]
    pub upload_dir: Option<String>,
}

fn parse_direction(s: &str) -> std::result::Result<Direction, String> {
    match s.to_lowercase().as_str() {
        "import" => Ok(Direction::Import),
        "export" => Ok(Direction::Export),
        other => Err(format!("unknown direction {:?} (expected import or export)", other)),
    }
}

fn parse_optional_byte(value: &Option<String>) -> Result<Option<u8>> {
    value.as_deref().map(parse_delimiter).transpose()
}

impl DatabaseConfig {
    /// Password from the config, falling back to `EDW_PASSWORD`.
    pub fn resolved_password(&self) -> Option<String> {
        self.password.clone().or_else(|| std::env::var("EDW_PASSWORD").ok())
    }

    /// Builds the ODBC connection string.
    pub fn get_connection_string(&self) -> String {
        let mut parts = match (&self.connection_string, &self.dsn) {
            (Some(cs), _) => vec![cs.trim_end_matches(';').to_string()],
            (None, Some(dsn)) => vec![format!("DSN={}", dsn)],
            (None, None) => {
                let mut parts = vec![format!(
                    "Driver={{{}}}",
                    self.driver.as_deref().unwrap_or("NetezzaSQL")
                )];
                parts.push(format!("Server={}", self.host.as_deref().unwrap_or("localhost")));
                parts.push(format!("Port={}", self.port.unwrap_or(5480)));
                if let Some(db) = &self.database {
                    parts.push(format!("Database={}", db));
                }
                parts
            }
        };
        let has = |key: &str| {
            parts
                .iter()
                .any(|p| p.to_uppercase().contains(&format!("{}=", key)))
        };
        let add_uid = !self.username.is_empty() && !has("UID");
        let add_pwd = !has("PWD");
        if add_uid {
            parts.push(format!("UID={}", self.username));
        }
        if add_pwd {
            if let Some(pwd) = self.resolved_password() {
                parts.push(format!("PWD={}", pwd));
            }
        }
        parts.join(";")
    }
}

impl JobConfig {
    /// Configured partition count, or one per CPU.
    pub fn partitions(&self) -> u32 {
        self.partitions.unwrap_or_else(|| num_cpus::get().max(1) as u32)
    }
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: AppConfig = if path.ends_with(".json") {
            serde_json::from_str(&contents)
                .map_err(|e| TransferError::Config(format!("{}: {}", path, e)))?
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|e| TransferError::Config(format!("{}: {}", path, e)))?
        };

        Ok(config)
    }

    /// Config for runs without a file; everything comes from the flags.
    pub fn default_from_cli(args: &CliArgs) -> Self {
        let mut config = AppConfig::default();
        config.merge_cli(args);
        config
    }

    pub fn merge_cli(&mut self, args: &CliArgs) {
        if let Some(c) = &args.connection_string { self.database.connection_string = Some(c.clone()); }
        if let Some(u) = &args.username { self.database.username = u.clone(); }
        if let Some(p) = &args.password { self.database.password = Some(p.clone()); }
        if let Some(d) = args.direction { self.job.direction = Some(d); }
        if let Some(t) = &args.table { self.job.table = Some(t.clone()); }
        if let Some(s) = &args.schema { self.job.schema = Some(s.clone()); }
        if let Some(c) = &args.columns { self.job.columns = Some(c.clone()); }
        if let Some(w) = &args.where_clause { self.job.where_clause = Some(w.clone()); }
        if let Some(m) = args.partitions { self.job.partitions = Some(m); }
        if let Some(a) = args.attempt { self.job.attempt = Some(a); }
        if let Some(w) = &args.work_dir { self.job.work_dir = Some(w.clone()); }
        if let Some(o) = &args.output { self.import.output_dir = Some(o.clone()); }
        if let Some(i) = &args.input { self.export.input_dir = Some(i.clone()); }
        if let Some(f) = &args.fields_terminated_by { self.format.fields_terminated_by = Some(f.clone()); }
        if let Some(n) = &args.null_string { self.format.null_string = Some(n.clone()); }
        if let Some(m) = args.max_errors { self.direct.max_errors = Some(m); }
        if let Some(l) = &args.log_dir { self.direct.log_dir = Some(l.clone()); }
        if let Some(u) = &args.upload_dir { self.direct.upload_dir = Some(u.clone()); }
    }

    fn requested_format(&self) -> Result<RequestedFormat> {
        let field_delimiter = match &self.format.fields_terminated_by {
            Some(f) => parse_delimiter(f)?,
            None => b',',
        };
        Ok(RequestedFormat {
            field_delimiter,
            escaped_by: parse_optional_byte(&self.format.escaped_by)?,
            enclosed_by: parse_optional_byte(&self.format.enclosed_by)?,
            lines_terminated_by: parse_optional_byte(&self.format.lines_terminated_by)?,
            null_string: self.format.null_string.clone(),
            null_non_string: self.format.null_non_string.clone(),
        })
    }

    /// Rejects everything that must fail before a pipe or thread exists.
    pub fn validate(&self) -> Result<()> {
        self.build_job_spec().map(|_| ())
    }

    /// Validates the configuration and freezes it into a `JobSpec`.
    pub fn build_job_spec(&self) -> Result<JobSpec> {
        let direction = self
            .job
            .direction
            .ok_or_else(|| TransferError::Config("job.direction must be import or export".into()))?;
        if self.job.query.is_some() {
            return Err(TransferError::Config(
                "free-form queries are not supported in direct mode; configure job.table".into(),
            ));
        }
        let table = self
            .job
            .table
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| TransferError::Config("job.table is required".into()))?
            .to_string();
        let partitions = self.job.partitions();
        if partitions == 0 {
            return Err(TransferError::Config("job.partitions must be at least 1".into()));
        }

        if self.job.pipe_open_timeout_secs == Some(0) {
            return Err(TransferError::Config(
                "job.pipe_open_timeout_secs must be at least 1; omit it to wait without a limit".into(),
            ));
        }

        let format = DelimiterFormat::resolve(&self.requested_format()?)?;

        let import_suffix = self.import.temp_table_suffix.clone().unwrap_or_else(|| "_temp".into());
        let export_suffix = self.export.temp_tables_suffix.clone().unwrap_or_else(|| "_temp_".into());
        if import_suffix.is_empty() || export_suffix.is_empty() {
            return Err(TransferError::Config("temp table suffixes must not be empty".into()));
        }

        let output_dir = self.import.output_dir.clone().map(PathBuf::from);
        let input_dir = self.export.input_dir.clone().map(PathBuf::from);
        match direction {
            Direction::Import if output_dir.is_none() => {
                return Err(TransferError::Config("import.output_dir is required for imports".into()))
            }
            Direction::Export if input_dir.is_none() => {
                return Err(TransferError::Config("export.input_dir is required for exports".into()))
            }
            _ => {}
        }

        let input = InputLayout {
            delimiter: match &self.format.input_fields_terminated_by {
                Some(d) => parse_delimiter(d)?,
                None => format.field_delimiter(),
            },
            escaped_by: match &self.format.input_escaped_by {
                Some(e) => Some(parse_delimiter(e)?),
                None => Some(format.escape()),
            },
            enclosed_by: parse_optional_byte(&self.format.input_enclosed_by)?,
        };

        let job_id = self
            .job
            .job_id
            .clone()
            .unwrap_or_else(|| format!("job_{}", chrono::Local::now().format("%Y%m%d%H%M%S")));

        Ok(JobSpec {
            job_id,
            direction,
            table,
            schema: self.job.schema.clone().filter(|s| !s.trim().is_empty()),
            columns: self.job.columns.clone().unwrap_or_default(),
            where_clause: self.job.where_clause.clone().filter(|w| !w.trim().is_empty()),
            partitions,
            attempt: self.job.attempt.unwrap_or(0),
            work_dir: self
                .job
                .work_dir
                .clone()
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("edw-direct")),
            pipe_open_timeout: self.job.pipe_open_timeout_secs.map(Duration::from_secs),
            format,
            direct: DirectOptions {
                max_errors: self.direct.max_errors.unwrap_or(1),
                log_dir: self.direct.log_dir.clone().map(PathBuf::from),
                upload_dir: self.direct.upload_dir.clone().map(PathBuf::from),
                ctrl_chars: self.direct.ctrl_chars.unwrap_or(false),
            },
            channel: self.job.channel.unwrap_or_default(),
            import: ImportSettings {
                partitioning: self.import.partitioning.unwrap_or_default(),
                temp_table_suffix: import_suffix,
                delete_temp_table: self.import.delete_temp_table.unwrap_or(true),
                output_dir: output_dir.unwrap_or_default(),
                compress: self.import.compress.unwrap_or(false),
            },
            export: ExportSettings {
                staging: self.export.staging.unwrap_or_default(),
                temp_tables_suffix: export_suffix,
                delete_temp_tables: self.export.delete_temp_tables.unwrap_or(true),
                input_dir: input_dir.unwrap_or_default(),
                input,
            },
        })
    }
}
