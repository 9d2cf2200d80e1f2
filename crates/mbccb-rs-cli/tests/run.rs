//! End-to-end tests of a `mesambccc` run on files in a temporary directory.

use std::fs;
use std::path::Path;

use clap::Parser;
use mbccb_rs::{Codec, Header};
use mbccb_rs_cli::{Cli, CliError, run};

const RIG_XML: &str = r#"<mesamodbus baudrate="38400">
  <devices><device name="vfd" address="3"/></devices>
  <commands>
    <command device="vfd" function="R_REGISTERS" address="0x100" count="2"
             name="status" modbustype="U_AB" haltype="HAL_U32"/>
    <command device="vfd" function="W_REGISTER" address="0x200" modbustype="S_AB"
             haltype="HAL_FLOAT">
      <pin name="setpoint"/>
    </command>
  </commands>
</mesamodbus>
"#;

fn cli(dir: &Path, input: &str, extra: &[&str]) -> Cli {
    let input_path = dir.join("input.xml");
    fs::write(&input_path, input).unwrap();
    let output_path = dir.join("out.mbccb");
    let mut args = vec![
        "mesambccc".to_string(),
        input_path.display().to_string(),
        "-o".to_string(),
        output_path.display().to_string(),
    ];
    args.extend(extra.iter().map(|s| s.to_string()));
    Cli::try_parse_from(args).unwrap()
}

#[test]
fn test_writes_image() {
    let dir = tempfile::tempdir().unwrap();
    let cli = cli(dir.path(), RIG_XML, &[]);
    let mut out = Vec::new();
    let outcome = run(&cli, &mut out, &mut Vec::new()).expect("Should compile");

    assert_eq!(outcome.written.as_deref(), Some(cli.output.as_path()));
    assert!(out.is_empty());
    let bytes = fs::read(&cli.output).unwrap();
    assert_eq!(bytes, outcome.compilation.image.as_bytes());
    let header = Header::deserialize(&bytes).unwrap();
    assert_eq!(header.baudrate, 38400);
}

#[test]
fn test_verbose_listing() {
    let dir = tempfile::tempdir().unwrap();
    let cli = cli(dir.path(), RIG_XML, &["--verbose"]);
    let mut out = Vec::new();
    run(&cli, &mut out, &mut Vec::new()).expect("Should compile");
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("==> 'vfd'"));
    assert!(text.contains("vfd.status-01"));
    assert!(text.contains("vfd.setpoint.scale"));
    assert!(text.contains("Pins           : 3"));
}

#[test]
fn test_json_and_check() {
    let dir = tempfile::tempdir().unwrap();
    let cli = cli(dir.path(), RIG_XML, &["--json", "--check"]);
    let mut out = Vec::new();
    let outcome = run(&cli, &mut out, &mut Vec::new()).expect("Should compile");
    assert!(outcome.written.is_none());
    assert!(!cli.output.exists());

    let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(json["params"]["baudrate"], 38400);
    assert_eq!(json["commands"].as_array().map(Vec::len), Some(2));
}

#[test]
fn test_rejected_document_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let broken = RIG_XML.replace(
        r#"device="vfd" function="R_REGISTERS""#,
        r#"function="R_REGISTERS""#,
    );
    let cli = cli(dir.path(), &broken, &[]);
    let mut diag = Vec::new();
    let err = run(&cli, &mut Vec::new(), &mut diag).unwrap_err();
    match err {
        CliError::Rejected(diags) => assert_eq!(diags.error_count(), 1),
        other => panic!("Expected a rejection, got {}", other),
    }
    assert!(!cli.output.exists());

    // Reported without any logger installed.
    let text = String::from_utf8(diag).unwrap();
    let expected = format!(
        "{}: error: Attribute 'device' missing (commands/command[1])",
        cli.input.display()
    );
    assert!(text.lines().any(|l| l == expected), "{}", text);
}

#[test]
fn test_warnings_reported_with_image() {
    let dir = tempfile::tempdir().unwrap();
    let noisy = RIG_XML.replace(r#"baudrate="38400""#, r#"baudrate="38400" colour="blue""#);
    let cli = cli(dir.path(), &noisy, &[]);
    let mut diag = Vec::new();
    let outcome = run(&cli, &mut Vec::new(), &mut diag).expect("Warnings only");

    assert!(outcome.written.is_some());
    let text = String::from_utf8(diag).unwrap();
    let expected = format!(
        "{}: warning: Unrecognized attribute 'colour' ignored",
        cli.input.display()
    );
    assert!(text.lines().any(|l| l.starts_with(&expected)), "{}", text);
}

#[test]
fn test_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.xml").display().to_string();
    let cli = Cli::try_parse_from(["mesambccc", missing.as_str()]).unwrap();
    assert!(matches!(
        run(&cli, &mut Vec::new(), &mut Vec::new()),
        Err(CliError::Read { .. })
    ));
}

#[test]
fn test_malformed_xml() {
    let dir = tempfile::tempdir().unwrap();
    let cli = cli(dir.path(), "<mesamodbus><devices></mesamodbus>", &[]);
    assert!(matches!(
        run(&cli, &mut Vec::new(), &mut Vec::new()),
        Err(CliError::Xml(_))
    ));
    assert!(!cli.output.exists());
}
