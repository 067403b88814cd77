use criterion::{black_box, criterion_group, criterion_main, Criterion};

use taxlink::{prepare, to_canonical_smiles, Canonicalizer};

const METHANE: &str = "C";
const CAFFEINE: &str = "Cn1cnc2c1c(=O)n(C)c(=O)n2C";
const BACCATIN: &str = "CC(=O)O[C@H]1C(=O)[C@]2(C)[C@@H](O)C[C@H]3OC[C@@]3(OC(C)=O)[C@H]2[C@H](OC(=O)c2ccccc2)[C@]2(O)C[C@H](O)C(C)=C1C2(C)C";
const TAXOL: &str = "CC1=C2[C@@]([C@]([C@H]([C@@H]3[C@]4([C@H](OC4)C[C@@H]([C@]3(C(=O)[C@@H]2OC(=O)C)C)O)OC(=O)C)OC(=O)c5ccccc5)(C[C@@H]1OC(=O)[C@@H](O)[C@@H](NC(=O)c6ccccc6)c7ccccc7)O)(C)C";

const INPUTS: [(&str, &str); 4] = [
    ("methane", METHANE),
    ("caffeine", CAFFEINE),
    ("baccatin", BACCATIN),
    ("taxol", TAXOL),
];

fn bench_prepare(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepare");
    for (name, smiles) in INPUTS {
        group.bench_function(name, |b| b.iter(|| black_box(prepare(black_box(smiles)).unwrap())));
    }
    group.finish();
}

fn bench_canonical(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonical");
    for (name, smiles) in INPUTS {
        let mol = prepare(smiles).unwrap();
        group.bench_function(name, |b| b.iter(|| black_box(to_canonical_smiles(black_box(&mol)))));
    }
    group.finish();
}

fn bench_identity_key(c: &mut Criterion) {
    let canonicalizer = Canonicalizer::default();
    let mut group = c.benchmark_group("identity_key");
    for (name, smiles) in INPUTS {
        group.bench_function(name, |b| {
            b.iter(|| black_box(canonicalizer.canonicalize(black_box(smiles)).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_prepare, bench_canonical, bench_identity_key);
criterion_main!(benches);
