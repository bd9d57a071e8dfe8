use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::rc::Rc;
use strata_model::{CodeModel, TracingSink, Visibility};
use strata_parser::{parse_compilation_unit, read_compilation_unit, CharScanner, LowLevelReader};

const PERSON: &str = r#"
package com.example;

import java.util.List;
import java.util.Map;

/**
 * A person with a name and friends.
 */
@Entity(table = "persons", cached = true)
public class Person<T extends Comparable<T>> extends Base implements java.io.Serializable {
    public static final int MAX_FRIENDS = 1 << 8;
    private String name = "unknown";
    private List<Person<?>> friends;
    private Map<String, ? extends Number> scores;

    public Person(String name) {
        this.name = name;
    }

    /** The name. */
    public String getName() {
        return name;
    }

    public void setName(final String name) {
        this.name = name;
    }

    @SafeVarargs
    public final void addFriends(Person<?>... others) throws IllegalStateException {
        for (Person<?> other : others) {
            friends.add(other);
        }
    }
}
"#;

fn scan_identifiers(source: &str) -> usize {
    let mut scanner = CharScanner::new(source);
    let mut count = 0;
    while !scanner.at_eof() {
        if scanner.identifier().is_some() {
            count += 1;
        } else {
            scanner.advance();
        }
    }
    count
}

fn bench_scanner(c: &mut Criterion) {
    let mut group = c.benchmark_group("scanner");
    group.throughput(Throughput::Bytes(PERSON.len() as u64));
    group.bench_function("identifiers", |b| b.iter(|| scan_identifiers(black_box(PERSON))));
    group.finish();
}

fn bench_expressions(c: &mut Criterion) {
    let mut group = c.benchmark_group("expressions");

    let inputs = [
        ("arithmetic", "1 + 2 * 3 - (4 / 5) % 6"),
        ("strings", r#""a" + "b\n" + 'c' + "A""#),
        ("array", r#"{ "x", "y", Foo.BAR, String.class, 0xFF, 1_000L }"#),
    ];
    for (name, source) in inputs {
        group.bench_with_input(BenchmarkId::new("read", name), &source, |b, source| {
            b.iter(|| {
                let mut reader = LowLevelReader::new(black_box(source), Rc::new(TracingSink), "bench");
                reader.read_expression().unwrap()
            });
        });
    }

    group.bench_function("modifiers", |b| {
        b.iter(|| {
            let mut reader = LowLevelReader::new(
                black_box("/** doc */ @Deprecated public static final synchronized int"),
                Rc::new(TracingSink),
                "bench",
            );
            reader.read_declaration_prefix(Visibility::Default).unwrap()
        });
    });

    group.finish();
}

fn bench_compilation_unit(c: &mut Criterion) {
    let mut group = c.benchmark_group("compilation_unit");
    group.throughput(Throughput::Bytes(PERSON.len() as u64));

    group.bench_function("parse", |b| {
        b.iter(|| parse_compilation_unit(black_box(PERSON), Rc::new(TracingSink), "Person.java").unwrap());
    });

    group.bench_function("read_into_model", |b| {
        b.iter(|| {
            let mut model = CodeModel::new();
            read_compilation_unit(&mut model, "com.example.Person", black_box(PERSON)).unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_scanner, bench_expressions, bench_compilation_unit);
criterion_main!(benches);
