//! 취약점 리포트 벤치마크
//!
//! JSON 아티팩트 파싱과 릴리스 간 비교 성능을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use relscan_vuln_report::{SummaryMap, compare, parse_json, parse_table};

const SEVERITIES: [&str; 5] = ["CRITICAL", "HIGH", "MEDIUM", "LOW", "UNKNOWN"];

/// count개의 취약점을 가진 Trivy JSON 아티팩트 생성
fn generate_report(count: usize) -> Vec<u8> {
    let vulns: Vec<_> = (0..count)
        .map(|i| {
            serde_json::json!({
                "VulnerabilityID": format!("CVE-2024-{i:05}"),
                "Severity": SEVERITIES[i % SEVERITIES.len()],
                "Title": format!("vulnerability number {i} in a commonly used library"),
                "FixedVersion": if i % 3 == 0 { "" } else { "1.2.3" },
                "PkgName": format!("pkg-{}", i % 40),
            })
        })
        .collect();
    serde_json::to_vec(&serde_json::json!({
        "SchemaVersion": 2,
        "Results": [{ "Target": "rootfs", "Vulnerabilities": vulns }]
    }))
    .expect("serialize report")
}

/// count개의 `CVE-` 줄을 가진 table 아티팩트 생성
fn generate_table(count: usize) -> String {
    let mut out = String::from("rootfs (rhel 9.4)\n=================\n");
    for i in 0..count {
        out.push_str(&format!("| pkg-{i} | CVE-2024-{i:05} | HIGH | 1.0 | 1.1 | title |\n"));
    }
    out
}

/// count개 이미지의 요약 맵 생성 (offset으로 이전/현재 차이를 만듦)
fn generate_map(count: usize, offset: usize) -> SummaryMap {
    let raw = generate_report(20);
    let base = parse_json(&raw).expect("parse fixture");
    (0..count)
        .map(|i| {
            let mut summary = base.clone();
            summary.critical = ((i + offset) % 7) as u64;
            summary.high = ((i * 3 + offset) % 11) as u64;
            (format!("component-{:04}", i + offset), summary)
        })
        .collect()
}

fn bench_parse_json(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_json");
    for count in [10, 100, 1000] {
        let raw = generate_report(count);
        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &raw, |b, raw| {
            b.iter(|| parse_json(black_box(raw)))
        });
    }
    group.finish();
}

fn bench_parse_table(c: &mut Criterion) {
    let table = generate_table(1000);
    c.bench_function("parse_table_1000", |b| {
        b.iter(|| parse_table(black_box(table.as_bytes())))
    });
}

fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare");
    for count in [50, 500] {
        let previous = generate_map(count, 0);
        let current = generate_map(count, count / 10);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(count),
            &(current, previous),
            |b, (current, previous)| b.iter(|| compare(black_box(current), black_box(previous))),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_parse_json, bench_parse_table, bench_compare);
criterion_main!(benches);
