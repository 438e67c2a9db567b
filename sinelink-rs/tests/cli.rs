/// End-to-end runs of the sinelink-rs binary on small fixtures.
///
/// Organism A uses the ensembl-gff3 dialect, organism B refseq-gff3. Two
/// orthologue pairs are planted: (ENSG01, Hox1) and (ENSG02, Hox2).
use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ── helpers ──────────────────────────────────────────────────────────────────

const ANNOTATION_A: &str = "\
##gff-version 3
1\tensembl\tgene\t1001\t2000\t.\t+\t.\tID=gene:ENSG01.3;Name=a1
1\tensembl\tgene\t5001\t6000\t.\t-\t.\tID=gene:ENSG02.1;Name=a2
";

const ANNOTATION_B: &str = "\
##gff-version 3
NC_1.1\tRefSeq\tgene\t101\t500\t.\t+\t.\tID=gene-Hox1;Name=Hox1
NC_1.1\tRefSeq\tgene\t10001\t11000\t.\t+\t.\tID=gene-Hox2;Name=Hox2
";

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let fx = Self { dir };
        fx.write("a.gff3", ANNOTATION_A);
        fx.write("b.gff3", ANNOTATION_B);
        fx.write("sines_a.bed", "1\t2100\t2200\tB1\n1\t1500\t1600\tB2\n1\t4800\t4900\tB3\n");
        fx.write("sines_b.bed", "NC_1\t600\t700\tB1\n");
        fx.write("flags_a.tsv", "1\t2100\t2200\tyes\n1\t1500\t1600\tno\n");
        fx.write("flags_b.tsv", "NC_1\t600\t700\tyes\n");
        fx.write("expr_a.tsv", "gene\ts1\ts2\nENSG01.3\t5\t5\nENSG02\t0\t1\n");
        fx.write("expr_b.tsv", "gene\ts1\ts2\nHox1\t1\t1\nHox2\t9\t9\n");
        fx.write("ab.tsv", "ENSG01\tHox1\t500\t1e-100\nENSG02\tHox2\t300\t1e-50\nENSG02\tHox1\t20\t1e-2\n");
        fx.write("ba.tsv", "gene-Hox1\tENSG01.3\t480\t1e-90\ngene-Hox2\tgene:ENSG02\t310\t1e-55\n");
        fx
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, body: &str) {
        std::fs::write(self.path(name), body).expect("write fixture");
    }

    fn out_dir(&self) -> PathBuf {
        self.path("out")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("sinelink-rs").expect("binary");
        for (flag, file) in [
            ("--annotation-a", "a.gff3"),
            ("--annotation-b", "b.gff3"),
            ("--sines-a", "sines_a.bed"),
            ("--sines-b", "sines_b.bed"),
            ("--sine-flags-a", "flags_a.tsv"),
            ("--sine-flags-b", "flags_b.tsv"),
            ("--expression-a", "expr_a.tsv"),
            ("--expression-b", "expr_b.tsv"),
        ] {
            cmd.arg(flag).arg(self.path(file));
        }
        cmd.arg("--out-dir").arg(self.out_dir()).arg("-q");
        cmd
    }

    fn with_hits(&self) -> Command {
        let mut cmd = self.command();
        cmd.arg("--hits-ab").arg(self.path("ab.tsv"));
        cmd.arg("--hits-ba").arg(self.path("ba.tsv"));
        cmd
    }
}

fn lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
        .lines()
        .map(str::to_string)
        .collect()
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[test]
fn full_run_writes_every_table() {
    let fx = Fixture::new();
    fx.with_hits().assert().success();
    let out = fx.out_dir();

    assert_eq!(
        lines(&out.join("A.sine_gene_links.tsv")),
        [
            "sine_locus\tgene_id\tdistance\tdirection\tsine_transcribed",
            "1:1500-1600\tENSG01\t0\tdownstream\tno",
            "1:2100-2200\tENSG01\t100\tupstream\tyes",
            "1:4800-4900\tENSG02\t100\tupstream\tno",
        ]
    );
    assert_eq!(
        lines(&out.join("A.sine_overlaps.tsv")),
        ["sine_locus\tgene_id", "1:1500-1600\tENSG01"]
    );
    assert_eq!(
        lines(&out.join("B.sine_gene_links.tsv")),
        [
            "sine_locus\tgene_id\tdistance\tdirection\tsine_transcribed",
            "NC_1:600-700\tHox1\t100\tupstream\tyes",
        ]
    );
    assert_eq!(
        lines(&out.join("A.distance_bins.tsv")),
        [
            "bin_lower\tbin_upper\tdirection\texpressed_count\ttotal_count",
            "0\t1000\tupstream\t1\t2",
            "0\t1000\tdownstream\t0\t1",
        ]
    );
    assert_eq!(
        lines(&out.join("rbh.tsv")),
        ["gene_a\tgene_b", "ENSG01\tHox1", "ENSG02\tHox2"]
    );
    assert_eq!(
        lines(&out.join("orthologue_summary.tsv")),
        [
            "gene_a\tgene_b\tsine_a\tsine_b\texpressed_a\texpressed_b",
            "ENSG01\tHox1\tyes\tyes\tyes\tno",
            "ENSG02\tHox2\tno\tNA\tno\tyes",
        ]
    );
}

#[test]
fn summary_json_carries_counts_and_audit() {
    let fx = Fixture::new();
    fx.with_hits().assert().success();
    let text = std::fs::read_to_string(fx.out_dir().join("summary.json")).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(summary["rbh_pairs"], 2);
    assert_eq!(summary["asymmetry"]["a_only"], 1);
    assert_eq!(summary["asymmetry"]["b_only"], 1);
    let a = &summary["organisms"]["A"];
    assert_eq!(a["summary"]["catalog_size"], 3);
    assert_eq!(a["summary"]["transcribed_loci"], 1);
    // locus 1:4800-4900 has no flag row
    assert_eq!(a["audit"]["join_miss"], 1);
}

#[test]
fn config_file_overrides_defaults() {
    let fx = Fixture::new();
    fx.write(
        "config.json",
        r#"{"expression_threshold": 0.5, "organisms": {"a": {"label": "mouse"}, "b": {"label": "rat", "annotation_dialect": "refseq-gff3"}}}"#,
    );
    fx.with_hits()
        .arg("--config")
        .arg(fx.path("config.json"))
        .assert()
        .success();
    assert!(fx.out_dir().join("mouse.sine_gene_links.tsv").is_file());
    assert!(fx.out_dir().join("rat.distance_bins.tsv").is_file());
    // threshold 0.5 makes ENSG02 (mean 0.5) and Hox1 (mean 1) expressed
    assert_eq!(
        lines(&fx.out_dir().join("orthologue_summary.tsv"))[1..],
        ["ENSG01\tHox1\tyes\tyes\tyes\tyes", "ENSG02\tHox2\tno\tNA\tyes\tyes"]
    );
}

#[test]
fn missing_hit_source_is_rejected() {
    let fx = Fixture::new();
    let output = fx.command().output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--hits-ab"), "{stderr}");
}

#[test]
fn unknown_dialect_is_rejected() {
    let fx = Fixture::new();
    let output = fx.with_hits().args(["--dialect-a", "flybase"]).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown dialect 'flybase'"), "{stderr}");
}

#[test]
fn unreadable_expression_matrix_fails_the_run() {
    let fx = Fixture::new();
    fx.write("expr_a.tsv", "gene\ts1\nENSG01\tlots\nENSG02\tfew\n");
    let output = fx.with_hits().output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("expr_a.tsv"), "{stderr}");
}
