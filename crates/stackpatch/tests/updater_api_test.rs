//! Integration tests for the public updater API
//!
//! These tests drive templates through the loader, the engine and the
//! runner the way a caller outside the crate would.

use std::{fs, path::PathBuf};

use stackpatch::{
    Document, Format, config::AppConfig, references, remove, runner::Runner,
    updaters::NewResourcesAdder,
};
use stackpatch_parser::{Loader, LoaderConfig, Writer, WriterConfig};
use tempfile::tempdir;

const TEMPLATE: &str = r#"AWSTemplateFormatVersion: '2010-09-09'
Resources:
  Bucket:
    Type: AWS::S3::Bucket
  Policy:
    Type: AWS::S3::BucketPolicy
    Properties:
      Bucket: !Ref Bucket
  Alarm:
    Type: AWS::CloudWatch::Alarm
    Properties:
      AlarmActions:
        - !GetAtt Policy.Arn
  Topic:
    Type: AWS::SNS::Topic
"#;

fn load(source: &str) -> Document {
    Loader::new(LoaderConfig::default())
        .load(source, Format::Yaml)
        .expect("Failed to load template")
}

#[test]
fn test_unchanged_template_round_trips() {
    let doc = load(TEMPLATE);
    let output = Writer::new(WriterConfig::default())
        .write(&doc)
        .expect("Failed to write template");

    assert!(!doc.is_dirty());
    assert_eq!(output, TEMPLATE);
}

#[test]
fn test_references_are_found_through_short_tags() {
    let doc = load(TEMPLATE);
    let resources = doc.resources().expect("resources");

    let policy = resources.get("Policy").expect("Policy");
    assert!(references::has_reference(policy, "Bucket"));

    let alarm = resources.get("Alarm").expect("Alarm");
    assert!(references::has_reference(alarm, "Policy"));
    assert!(!references::has_reference(alarm, "Bucket"));
}

#[test]
fn test_removal_closure_is_built_by_the_caller() {
    let mut doc = load(TEMPLATE);

    let removed = remove::remove_with_dependents(&mut doc, "Bucket");
    assert_eq!(removed, Some(vec!["Policy".to_string()]));

    // Alarm still points at the removed policy until the caller follows up.
    let removed = remove::remove_dependents(&mut doc, "Policy");
    assert_eq!(removed, ["Alarm"]);

    let output = Writer::new(WriterConfig::default())
        .write(&doc)
        .expect("Failed to write template");
    assert_eq!(
        output,
        "AWSTemplateFormatVersion: '2010-09-09'\nResources:\n  Topic:\n    Type: AWS::SNS::Topic\n"
    );
}

#[test]
fn test_runner_is_idempotent() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("stack.yaml");
    fs::write(&path, TEMPLATE).expect("write template");

    let source = load(
        "AWSTemplateFormatVersion: '2010-09-09'\nResources:\n  Queue:\n    Type: AWS::SQS::Queue\n",
    );
    let mut adder = NewResourcesAdder::new(source);
    let runner = Runner::new(&AppConfig::default());
    let paths = [PathBuf::from(dir.path())];

    let first = runner.run(&paths, &mut adder).expect("first run");
    assert_eq!((first.visited, first.changed, first.written), (1, 1, 1));

    let written = fs::read_to_string(&path).expect("read template");
    assert!(written.starts_with(TEMPLATE));
    assert!(written.contains("  Queue:\n"));

    let second = runner.run(&paths, &mut adder).expect("second run");
    assert_eq!((second.visited, second.changed, second.written), (1, 0, 0));
    assert_eq!(fs::read_to_string(&path).expect("read template"), written);
}
