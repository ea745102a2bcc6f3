//! Library integration tests.

use runnel::RunnelError;

#[test]
fn error_types_are_public() {
    let err = RunnelError::CyclicDependency {
        cycle: "a -> b -> a".into(),
    };
    assert!(err.to_string().contains("a -> b -> a"));
    assert!(err.is_construction_error());
}

#[test]
fn result_type_alias_is_public() {
    fn test_fn() -> runnel::Result<()> {
        Ok(())
    }
    assert!(test_fn().is_ok());
}

#[test]
fn cli_types_are_public() {
    use runnel::cli::{Cli, Commands};
    use clap::Parser;

    let cli = Cli::parse_from(["runnel", "show", "--json", "full"]);

    if let Some(Commands::Show(args)) = cli.command {
        assert!(args.json);
        assert_eq!(args.targets, vec!["full"]);
    } else {
        panic!("Expected Show command");
    }
}

#[test]
fn config_loads_from_disk() {
    use runnel::config::{load, ConfigPaths};
    use std::fs;
    use tempfile::TempDir;

    let temp = TempDir::new().unwrap();
    let project = temp.path().join("run");
    fs::create_dir_all(&project).unwrap();
    fs::write(
        project.join("pipeline.yml"),
        "params:\n  inp_title: local\ntasks:\n  - name: a\n",
    )
    .unwrap();
    fs::write(
        temp.path().join("pipeline.yml"),
        "params:\n  inp_title: shared\n  GRM_dir: grm\n",
    )
    .unwrap();

    let loaded = load(&ConfigPaths::discover(&project, None)).unwrap();

    assert_eq!(loaded.params.get("inp_title").as_deref(), Some("local"));
    assert_eq!(loaded.params.get("GRM_dir").as_deref(), Some("grm"));
    assert_eq!(loaded.sources.len(), 2);
}

#[test]
fn graph_builder_from_config() {
    use runnel::config::{parse_config, ParameterStore};
    use runnel::runner::GraphBuilder;
    use std::path::Path;

    let config = parse_config(
        r#"
params:
  chroms: [21, 22]
tasks:
  - name: gwa
    outputs: ["asso/chr${chrom}.fastGWA"]
    fan_out: { name: chrom, param: chroms }
    command: { program: gcta64, args: ["--chr", "${chrom}", "--out", "${outputs}"] }
  - name: full
    follows: [gwa]
"#,
        Path::new("pipeline.yml"),
    )
    .unwrap();
    let params = ParameterStore::from_mapping(&config.params).unwrap();

    let graph = GraphBuilder::from_config(params, &config.tasks)
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(
        graph.order_ids(),
        vec!["gwa[chrom=21]", "gwa[chrom=22]", "full"]
    );
    let gwa = graph.instance(graph.find("gwa[chrom=22]").unwrap());
    let command = gwa.command.as_ref().unwrap();
    assert_eq!(
        command.args,
        vec!["--chr", "22", "--out", "asso/chr22.fastGWA"]
    );
}
