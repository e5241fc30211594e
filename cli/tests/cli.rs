use std::fs;
use std::path::Path;

use clap::Parser;
use expect_test::expect;
use flow_spi_cli::Args;

fn run(args: &[&str]) -> Result<String, flow_spi_cli::Error> {
    let args = Args::parse_from(std::iter::once("flow-spi").chain(args.iter().copied()));
    let mut out = Vec::new();
    flow_spi_cli::run(&args, &mut out)?;
    Ok(String::from_utf8(out).expect("output must be utf-8"))
}

fn write_resource(root: &Path, identity: &str, contents: &str) {
    let dir = root.join("META-INF/flow-engine");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(identity), contents).unwrap();
}

#[test]
fn points() {
    expect![[r#"
        IDENTITY                   DEFAULT  SINGLETON
        flow.sample.DataConverter  json     true
        flow.sample.Greeter        -        false
    "#]]
    .assert_eq(&run(&["points"]).unwrap());
}

#[test]
fn list_converters() {
    expect![[r#"
        NAME            PRIORITY  FACTORY
        json (default)  0         flow.sample.JsonConverter
        xml             100       flow.sample.XmlConverter
    "#]]
    .assert_eq(&run(&["list", "converter"]).unwrap());
}

#[test]
fn list_greeters() {
    expect![[r#"
        NAME     PRIORITY  FACTORY
        english  0         flow.sample.EnglishGreeter
        pirate   10        flow.sample.PirateGreeter
    "#]]
    .assert_eq(&run(&["list", "greeter"]).unwrap());
}

#[test]
fn convert_with_default() {
    expect![[r#"
        JSON:hello
    "#]]
    .assert_eq(&run(&["convert", "hello"]).unwrap());
}

#[test]
fn convert_with_named() {
    expect![[r#"
        <xml>hello</xml>
    "#]]
    .assert_eq(&run(&["convert", "--with", "xml", "hello"]).unwrap());
}

#[test]
fn convert_with_unknown() {
    let err = run(&["convert", "--with", "yaml", "hello"]).unwrap_err();
    expect![[r#"no extension named "yaml" registered for flow.sample.DataConverter"#]]
        .assert_eq(&err.to_string());
}

#[test]
fn greet_with_all() {
    expect![[r#"
        Hello, world!
        Ahoy, world!
    "#]]
    .assert_eq(&run(&["greet", "world"]).unwrap());
}

#[test]
fn greet_with_named() {
    expect![[r#"
        Ahoy, world!
    "#]]
    .assert_eq(&run(&["greet", "--with", "pirate", "world"]).unwrap());
}

#[test]
fn resource_root_adds_extensions() {
    let root = tempfile::tempdir().unwrap();
    write_resource(
        root.path(),
        "flow.sample.DataConverter",
        "legacy=flow.sample.XmlConverter\nbroken=does.not.Exist\n",
    );

    let root = root.path().to_str().unwrap();
    expect![[r#"
        NAME            PRIORITY  FACTORY
        json (default)  0         flow.sample.JsonConverter
        xml             100       flow.sample.XmlConverter
        legacy          100       flow.sample.XmlConverter
    "#]]
    .assert_eq(&run(&["--resource-root", root, "list", "converter"]).unwrap());
}

#[test]
fn resource_root_overrides_shipped_records() {
    let root = tempfile::tempdir().unwrap();
    write_resource(
        root.path(),
        "flow.sample.DataConverter",
        "json=flow.sample.XmlConverter\n",
    );

    let root = root.path().to_str().unwrap();
    expect![[r#"
        <xml>hello</xml>
    "#]]
    .assert_eq(&run(&["--resource-root", root, "convert", "hello"]).unwrap());
}

#[test]
fn resource_dir_keeps_shipped_extensions() {
    expect![[r#"
        JSON:hello
    "#]]
    .assert_eq(&run(&["--resource-dir", "plugins", "convert", "hello"]).unwrap());
}

#[test]
fn resource_dir_is_probed_below_each_root() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("plugins");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("flow.sample.DataConverter"),
        "legacy=flow.sample.XmlConverter\n",
    )
    .unwrap();

    let root = root.path().to_str().unwrap();
    expect![[r#"
        NAME            PRIORITY  FACTORY
        json (default)  0         flow.sample.JsonConverter
        xml             100       flow.sample.XmlConverter
        legacy          100       flow.sample.XmlConverter
    "#]]
    .assert_eq(
        &run(&[
            "--resource-root",
            root,
            "--resource-dir",
            "/plugins/",
            "list",
            "converter",
        ])
        .unwrap(),
    );
}

#[test]
fn resource_dir_must_not_be_empty() {
    let err = run(&["--resource-dir", " / ", "points"]).unwrap_err();
    expect![[r#"invalid configuration: resource directory " / " is empty"#]]
        .assert_eq(&err.to_string());
}
