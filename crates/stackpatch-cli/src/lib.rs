//! CLI logic for the Stackpatch template updater.
//!
//! This module turns parsed [`Args`] into a template updater and runs it over
//! the given paths.

pub mod error_adapter;

mod args;
mod config;

pub use args::{Args, CONTAINER_IMAGES_ENV, Command, LAMBDA_S3_KEYS_ENV};

use std::{fs, path::Path};

use log::info;

use stackpatch::{
    StackpatchError,
    catalog::StaticCatalog,
    config::AppConfig,
    runner::{RunSummary, Runner, load_path},
    updaters::{
        ConfigRulePolicyUpdater, ContainerImageUpdater, LambdaInlineCodeUpdater,
        LambdaS3KeyUpdater, LatestAmiUpdater, NewResourcesAdder, ResourceRemover,
        RestApiBodyUpdater, StateMachineDefinitionUpdater, TemplateUpdater, check_resource_name,
        load_rest_api_body,
    },
};

/// Run the Stackpatch CLI application
///
/// Loads the configuration, builds the updater for the subcommand and runs
/// it over every template below the given paths.
///
/// # Errors
///
/// Returns `StackpatchError` for:
/// - Configuration loading errors
/// - Invalid arguments, such as a malformed container image or resource name
/// - A failed image lookup
/// - File I/O errors
/// - Parsing errors
pub fn run(args: &Args) -> Result<RunSummary, StackpatchError> {
    let app_config = config::load_config(args.config.as_ref())?;

    let Some(mut updater) = build_updater(&args.command, &app_config)? else {
        return Ok(RunSummary::default());
    };

    let summary = Runner::new(&app_config)
        .with_dry_run(args.dry_run)
        .run(args.command.paths(), updater.as_mut())?;

    info!(
        changed = summary.changed,
        written = summary.written,
        dry_run = args.dry_run;
        "Templates processed"
    );
    Ok(summary)
}

/// Builds the updater for `command`, or `None` if there is nothing to do.
///
/// Every argument is validated here, before any template is read.
fn build_updater(
    command: &Command,
    app_config: &AppConfig,
) -> Result<Option<Box<dyn TemplateUpdater>>, StackpatchError> {
    let loader = app_config.loader_config();
    check_resource_names(command)?;
    let updater: Box<dyn TemplateUpdater> = match command {
        Command::LatestAmi {
            ami_name_pattern,
            add_new_version,
            catalog,
            ..
        } => {
            let Some(path) = catalog.as_deref().or_else(|| app_config.catalog().path()) else {
                return Err(StackpatchError::Config(
                    "no image catalog configured; pass --catalog or set catalog.path".to_string(),
                ));
            };
            let catalog = StaticCatalog::load(path)?;
            Box::new(
                LatestAmiUpdater::new(catalog, ami_name_pattern)?
                    .with_new_version(*add_new_version),
            )
        }
        Command::RestApiBody {
            resource,
            open_api_specification,
            api_gateway_extensions,
            add_new_version,
            keep,
            ..
        } => {
            let body =
                load_rest_api_body(open_api_specification, api_gateway_extensions, loader)?;
            Box::new(
                RestApiBodyUpdater::new(resource.as_str(), body)
                    .with_new_version(*add_new_version)
                    .with_keep(keep.unwrap_or_else(|| app_config.versions().keep())),
            )
        }
        Command::RemoveResource { resources, .. } => {
            Box::new(ResourceRemover::new(resources.clone()))
        }
        Command::AddNewResources { source, .. } => {
            Box::new(NewResourcesAdder::new(load_path(source, loader)?))
        }
        Command::ContainerImage { images, .. } => {
            let updater = ContainerImageUpdater::new(images)?;
            if updater.is_empty() {
                info!("No container images to update");
                return Ok(None);
            }
            Box::new(updater)
        }
        Command::LambdaS3Key { s3_keys, .. } => {
            let updater = LambdaS3KeyUpdater::new(s3_keys)?;
            if updater.is_empty() {
                info!("No Lambda S3 keys to update");
                return Ok(None);
            }
            Box::new(updater)
        }
        Command::ConfigRuleInlineCode { resource, file, .. } => {
            Box::new(ConfigRulePolicyUpdater::new(resource.as_str(), read_text(file)?))
        }
        Command::LambdaInlineCode { resource, file, .. } => {
            Box::new(LambdaInlineCodeUpdater::new(resource.as_str(), read_text(file)?))
        }
        Command::StateMachineDefinition {
            resource,
            definition,
            no_fn_sub,
            ..
        } => Box::new(
            StateMachineDefinitionUpdater::new(resource.as_str(), read_text(definition)?)
                .with_fn_sub(!no_fn_sub),
        ),
    };
    Ok(Some(updater))
}

fn check_resource_names(command: &Command) -> Result<(), StackpatchError> {
    match command {
        Command::RemoveResource { resources, .. } => resources
            .iter()
            .try_for_each(|resource| check_resource_name(resource)),
        Command::RestApiBody { resource, .. }
        | Command::LambdaInlineCode { resource, .. }
        | Command::ConfigRuleInlineCode { resource, .. }
        | Command::StateMachineDefinition { resource, .. } => check_resource_name(resource),
        Command::LatestAmi { .. }
        | Command::AddNewResources { .. }
        | Command::ContainerImage { .. }
        | Command::LambdaS3Key { .. } => Ok(()),
    }
}

fn read_text(path: &Path) -> Result<String, StackpatchError> {
    if !path.exists() {
        return Err(StackpatchError::NotFound(path.to_path_buf()));
    }
    Ok(fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    /// Parses a command line whose words are separated by single spaces.
    fn parse_command(line: &str) -> Command {
        Args::try_parse_from(line.split(' '))
            .expect("valid arguments")
            .command
    }

    #[test]
    fn test_invalid_resource_names_are_rejected() {
        let invalid = [
            parse_command("stackpatch remove-resource --resource Good --resource A.B t.yaml"),
            parse_command("stackpatch remove-resource --resource  t.yaml"),
            parse_command("stackpatch lambda-inline-code --resource My-Fn --file f.py t.yaml"),
            parse_command(
                "stackpatch config-rule-inline-code --resource Rule.Arn --file p.guard t.yaml",
            ),
            parse_command(
                "stackpatch rest-api-body --resource Api! --open-api-specification o.yaml \
                 --api-gateway-extensions e.json t.yaml",
            ),
        ];

        for command in &invalid {
            let err = check_resource_names(command).expect_err("invalid resource name");
            assert!(
                matches!(err, StackpatchError::InvalidArgument(_)),
                "{command:?}"
            );
        }

        let valid = parse_command("stackpatch remove-resource --resource Bucket t.yaml");
        assert!(check_resource_names(&valid).is_ok());
    }

    #[test]
    fn test_name_check_runs_before_files_are_read() {
        let command = Command::StateMachineDefinition {
            resource: "Machine.Arn".to_string(),
            definition: "does-not-exist.json".into(),
            no_fn_sub: false,
            paths: vec!["t.yaml".into()],
        };

        let result = build_updater(&command, &AppConfig::default());
        assert!(matches!(result, Err(StackpatchError::InvalidArgument(_))));
    }

    #[test]
    fn test_empty_s3_key_list_is_nothing_to_do() {
        let command = Command::LambdaS3Key {
            s3_keys: Vec::new(),
            paths: vec!["t.yaml".into()],
        };

        let result = build_updater(&command, &AppConfig::default());
        assert!(matches!(result, Ok(None)));
    }
}
