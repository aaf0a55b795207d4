use bot_param::{lexer::Lexer, parser::Parser, ParamStore, ParamUpdate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

// ============================================================================
// Test Data
// ============================================================================

const TINY_CFG: &str = "value = 42;";

const SMALL_CFG: &str = r#"
name = "rover";
rate = 50;
enabled = true;
tags = [a, b, c];
"#;

const MEDIUM_CFG: &str = r#"
# Robot-wide settings
name = "rover";
rate = 50;

drivetrain {
    wheels = 4;
    wheel_radius = (double) 0.165;
    motor_ids = [0x10, 0x11, 0x12, 0x13];
    inverted = [false, true, false, true];
    left { motor_ids = [0x10, 0x12]; }
    right { motor_ids = [0x11, 0x13]; }
}

sensors {
    lidar { frame = "lidar_link"; range = [0.1, 30.0]; }
    imu { frame = "imu_link"; rate = 200; }
    cameras {
        front { frame = "cam_front"; resolution = [1280, 720]; }
        rear { frame = "cam_rear"; resolution = [640, 480]; }
    }
}
"#;

/// `count` containers, each holding a few scalars and an array.
fn generate_large_cfg(count: usize) -> String {
    let mut out = String::from("rate = 10;\n");
    for i in 0..count {
        out.push_str(&format!(
            "joint{i} {{\n    id = {i};\n    name = \"joint {i}\";\n    limits = [-1.57, 1.57];\n    gains {{ p = 1.5; i = 0.01; d = 0.2; }}\n}}\n"
        ));
    }
    out
}

// ============================================================================
// Lexer
// ============================================================================

fn bench_lexer_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_by_size");

    for (name, source) in [("tiny", TINY_CFG), ("small", SMALL_CFG), ("medium", MEDIUM_CFG)] {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, src| {
            b.iter(|| {
                let mut lexer = Lexer::new(black_box(src));
                lexer.lex()
            })
        });
    }

    group.finish();
}

// ============================================================================
// Parser
// ============================================================================

fn bench_parser_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_by_size");

    for (name, source) in [("tiny", TINY_CFG), ("small", SMALL_CFG), ("medium", MEDIUM_CFG)] {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, src| {
            b.iter(|| {
                let mut parser = Parser::new(black_box(src));
                parser.parse_tree()
            })
        });
    }

    group.finish();
}

fn bench_parser_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_container_scaling");

    for size in [10, 100, 1000] {
        let source = generate_large_cfg(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, src| {
            b.iter(|| {
                let mut parser = Parser::new(black_box(src));
                parser.parse_tree()
            })
        });
    }

    group.finish();
}

// ============================================================================
// Lookup
// ============================================================================

fn bench_lookup(c: &mut Criterion) {
    let store = ParamStore::from_str(MEDIUM_CFG).expect("benchmark config parses");
    let mut group = c.benchmark_group("lookup");

    group.bench_function("direct", |b| {
        b.iter(|| store.get_int(black_box("drivetrain.wheels")))
    });
    group.bench_function("inherited", |b| {
        b.iter(|| store.get_int(black_box("sensors.cameras.front.rate")))
    });
    group.bench_function("int_array", |b| {
        let mut out = [0i64; 4];
        b.iter(|| store.get_int_array(black_box("drivetrain.motor_ids"), &mut out))
    });
    group.bench_function("set", |b| {
        b.iter(|| store.set_double(black_box("drivetrain.wheel_radius"), 0.2))
    });

    group.finish();
}

// ============================================================================
// Snapshots
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("round_trip");

    for size in [10, 100] {
        let store = ParamStore::from_str(&generate_large_cfg(size)).expect("generated config parses");
        group.bench_with_input(BenchmarkId::new("write_and_parse", size), &store, |b, store| {
            b.iter(|| ParamStore::from_str(&black_box(store).to_string()))
        });
    }

    group.finish();
}

fn bench_handle_update(c: &mut Criterion) {
    let source = generate_large_cfg(100);
    let store = ParamStore::new();
    let mut seq = 0;

    c.bench_function("handle_update_100", |b| {
        b.iter(|| {
            seq += 1;
            store.handle_update(black_box(&ParamUpdate {
                utime: 0,
                server_id: 1,
                sequence_number: seq,
                params: source.clone(),
            }))
        })
    });
}

criterion_group!(lexer_benches, bench_lexer_sizes);
criterion_group!(parser_benches, bench_parser_sizes, bench_parser_scaling);
criterion_group!(store_benches, bench_lookup, bench_round_trip, bench_handle_update);
criterion_main!(lexer_benches, parser_benches, store_benches);
