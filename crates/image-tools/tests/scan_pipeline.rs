//! 미러 리다이렉트 → 스캔 fallback → 아티팩트 파싱 통합 테스트

use relscan_core::{ImageRecord, MirrorRule, MirrorRules};
use relscan_image_tools::{MockCommandRunner, ScanMode, ScanOptions, TrivyScanner};
use relscan_vuln_report::{ArtifactFormat, ReportLayout, parser};

const TRIVY_JSON: &str = r#"{"Results":[{"Vulnerabilities":[
    {"VulnerabilityID":"CVE-2024-0001","Severity":"CRITICAL","PkgName":"openssl","FixedVersion":"3.0.9"},
    {"VulnerabilityID":"CVE-2024-0002","Severity":"HIGH","PkgName":"glibc"}
]}]}"#;

fn record() -> ImageRecord {
    ImageRecord::new("console").with_image(
        "registry.redhat.io/rhacm2",
        "console-rhel9",
        format!("sha256:{}", "ab".repeat(32)),
    )
}

#[tokio::test]
async fn mirrored_reference_is_scanned_via_local_fallback() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = ReportLayout::new(dir.path(), "2.17.0");
    layout.prepare().await.expect("prepare");

    let rules = MirrorRules::new(vec![MirrorRule::new(
        "registry.redhat.io/rhacm2",
        "quay.io/acm-d",
    )]);
    let redirect = rules.redirect(&record().reference());
    assert!(redirect.is_redirected());
    assert!(redirect.reference.starts_with("quay.io/acm-d/console-rhel9@"));

    let runner = MockCommandRunner::new()
        .fail("--image-src remote", "unauthorized")
        .succeed("--image-src podman", TRIVY_JSON);
    let options = ScanOptions {
        format: ArtifactFormat::Json,
        ..ScanOptions::default()
    };
    let scanner = TrivyScanner::new(runner, options);

    let output = layout.artifact_path("console", ArtifactFormat::Json);
    let mode = scanner
        .scan(&redirect.reference, &output)
        .await
        .expect("fallback scan");
    assert_eq!(mode, ScanMode::LocalStore);

    for line in scanner.runner().call_lines() {
        assert!(line.contains("quay.io/acm-d/"), "unexpected call: {line}");
    }

    let summary = parser::parse_file(&output).await.expect("artifact parses");
    assert_eq!(summary.critical, 1);
    assert_eq!(summary.high, 1);
    assert_eq!(summary.has_fix, 1);
    assert_eq!(summary.no_fix, 1);
}

#[tokio::test]
async fn pull_failure_artifact_is_not_zero_vulnerabilities() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = ReportLayout::new(dir.path(), "2.17.0");
    layout.prepare().await.expect("prepare");

    let runner = MockCommandRunner::new()
        .time_out("--image-src remote")
        .fail("podman pull", "denied");
    let options = ScanOptions {
        format: ArtifactFormat::Json,
        ..ScanOptions::default()
    };
    let scanner = TrivyScanner::new(runner, options);
    let output = layout.artifact_path("console", ArtifactFormat::Json);

    let failure = scanner
        .scan(&record().reference(), &output)
        .await
        .unwrap_err();
    assert!(failure.reason.contains("denied"));

    // 실패 사유가 기록된 파일은 JSON으로 파싱되지 않아야 함
    assert!(parser::parse_file(&output).await.is_err());
}
