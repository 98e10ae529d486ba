//! Command-line argument definitions for the Stackpatch CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Global options control dry runs, configuration file
//! selection and logging verbosity; each subcommand selects one kind of
//! template update.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Environment variable holding whitespace separated container images.
pub const CONTAINER_IMAGES_ENV: &str = "STACKPATCH_CONTAINER_IMAGES";

/// Environment variable holding whitespace separated Lambda S3 keys.
pub const LAMBDA_S3_KEYS_ENV: &str = "STACKPATCH_LAMBDA_S3_KEYS";

/// Command-line arguments for the Stackpatch template updater
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Show what would change without writing any file
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Log debug output (same as --log-level debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    /// The log level to use, taking `--verbose` into account.
    pub fn effective_log_level(&self) -> &str {
        if self.verbose { "debug" } else { self.log_level.as_str() }
    }
}

/// Template updates
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Update the name filter of Custom::AMI resources to the latest image
    LatestAmi {
        /// Glob pattern of the image name, e.g. `amzn-ami-*ecs-optimized`
        #[arg(long)]
        ami_name_pattern: String,

        /// Add a new version of the resource instead of updating it in place
        #[arg(long)]
        add_new_version: bool,

        /// Offline image catalog (TOML); overrides `catalog.path` in the
        /// configuration
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Templates or directories to update
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Update the body of an AWS::ApiGateway::RestApi resource
    RestApiBody {
        /// Base name of the REST API resource
        #[arg(long)]
        resource: String,

        /// OpenAPI specification (YAML or JSON)
        #[arg(long)]
        open_api_specification: PathBuf,

        /// API Gateway extensions merged into the specification
        #[arg(long)]
        api_gateway_extensions: PathBuf,

        /// Add a new version of the resource so that it is redeployed
        #[arg(long)]
        add_new_version: bool,

        /// Number of versions to retain with --add-new-version
        #[arg(long)]
        keep: Option<usize>,

        /// Templates or directories to update
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Remove resources and every entity that refers to them
    RemoveResource {
        /// Name of a resource to remove; may be repeated
        #[arg(long = "resource", required = true)]
        resources: Vec<String>,

        /// Templates or directories to update
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Add the parameters, resources, conditions and mappings of a source
    /// template that are missing
    AddNewResources {
        /// Template to copy entities from
        #[arg(long)]
        source: PathBuf,

        /// Templates or directories to update
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Update the image of ECS container definitions
    ContainerImage {
        /// New image as `repository:tag`; may be repeated
        #[arg(long = "image", env = CONTAINER_IMAGES_ENV, value_delimiter = ' ')]
        images: Vec<String>,

        /// Templates or directories to update
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Update the inline code of an AWS::Lambda::Function resource
    LambdaInlineCode {
        /// Name of the Lambda function resource
        #[arg(long)]
        resource: String,

        /// File with the code
        #[arg(long)]
        file: PathBuf,

        /// Templates or directories to update
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Update the S3Key of AWS::Lambda::Function resources to a newer release
    LambdaS3Key {
        /// New key as `<prefix><semver>.zip`; may be repeated
        #[arg(long = "s3-key", env = LAMBDA_S3_KEYS_ENV, value_delimiter = ' ')]
        s3_keys: Vec<String>,

        /// Templates or directories to update
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Update the policy text of a CUSTOM_POLICY AWS::Config::ConfigRule
    /// resource
    ConfigRuleInlineCode {
        /// Name of the Config rule resource
        #[arg(long)]
        resource: String,

        /// File with the Guard policy
        #[arg(long)]
        file: PathBuf,

        /// Templates or directories to update
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Update the definition of an AWS::StepFunctions::StateMachine resource
    StateMachineDefinition {
        /// Name of the state machine resource
        #[arg(long)]
        resource: String,

        /// File with the state machine definition
        #[arg(long)]
        definition: PathBuf,

        /// Write the definition as is instead of wrapping it in Fn::Sub
        #[arg(long)]
        no_fn_sub: bool,

        /// Templates or directories to update
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

impl Command {
    /// Templates or directories the command applies to.
    pub fn paths(&self) -> &[PathBuf] {
        match self {
            Command::LatestAmi { paths, .. }
            | Command::RestApiBody { paths, .. }
            | Command::RemoveResource { paths, .. }
            | Command::AddNewResources { paths, .. }
            | Command::ContainerImage { paths, .. }
            | Command::LambdaInlineCode { paths, .. }
            | Command::LambdaS3Key { paths, .. }
            | Command::ConfigRuleInlineCode { paths, .. }
            | Command::StateMachineDefinition { paths, .. } => paths,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "stackpatch",
            "remove-resource",
            "--resource",
            "A",
            "--resource",
            "B",
            "template.yaml",
            "--dry-run",
            "--verbose",
        ])
        .expect("valid arguments");

        assert!(args.dry_run);
        assert_eq!(args.effective_log_level(), "debug");
        match args.command {
            Command::RemoveResource { resources, paths } => {
                assert_eq!(resources, ["A", "B"]);
                assert_eq!(paths, [PathBuf::from("template.yaml")]);
            }
            other => panic!("Expected remove-resource, got {other:?}"),
        }
    }

    #[test]
    fn test_state_machine_fn_sub_flag() {
        let args = Args::try_parse_from([
            "stackpatch",
            "state-machine-definition",
            "--resource",
            "Machine",
            "--definition",
            "machine.json",
            "--no-fn-sub",
            "template.yaml",
        ])
        .expect("valid arguments");

        assert!(matches!(
            args.command,
            Command::StateMachineDefinition { no_fn_sub: true, .. }
        ));
    }

    #[test]
    fn test_s3_keys_are_repeatable() {
        let args = Args::try_parse_from([
            "stackpatch",
            "lambda-s3-key",
            "--s3-key",
            "lambdas/a-1.0.0.zip",
            "--s3-key",
            "lambdas/b-2.0.0.zip",
            "template.yaml",
        ])
        .expect("valid arguments");

        match args.command {
            Command::LambdaS3Key { s3_keys, .. } => {
                assert_eq!(s3_keys, ["lambdas/a-1.0.0.zip", "lambdas/b-2.0.0.zip"]);
            }
            other => panic!("Expected lambda-s3-key, got {other:?}"),
        }
    }

    #[test]
    fn test_paths_are_required() {
        let line = ["stackpatch", "latest-ami", "--ami-name-pattern", "x"];
        assert!(Args::try_parse_from(line).is_err());
    }
}
