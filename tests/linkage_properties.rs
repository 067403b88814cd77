use std::collections::BTreeSet;
use std::fs;

use taxlink::{
    Canonicalizer, Compendium, Edge, Execution, LinkageBuilder, LinkageGraph, OutputNames,
    RuleCategory, RuleLibrary, TransformationEngine,
};

const PRIMARY_ALCOHOL_OXIDATION: &str = "[CH2:1][OH:2]>>[C:1]=[O:2]";
const SECONDARY_ALCOHOL_OXIDATION: &str = "[CH1:1]([#6:3])([#6:4])[OH:2]>>[C:1]([#6:3])([#6:4])=[O:2]";
const KETONE_REDUCTION: &str = "[#6:3][C:1](=[O:2])[#6:4]>>[#6:3][C:1]([OH:2])[#6:4]";
const ESTER_HYDROLYSIS: &str = "[C:1](=[O:2])[O:3][C:4]>>[C:1](=[O:2])[OH:3].[OH][C:4]";

fn compendium(smiles: &[&str]) -> Compendium {
    Compendium::from_structures(smiles.iter().copied(), &Canonicalizer::default())
}

fn library(patterns: &[&str], category: RuleCategory) -> RuleLibrary {
    RuleLibrary::from_patterns(patterns.iter().copied(), category).unwrap()
}

fn assert_well_formed(graph: &LinkageGraph) {
    let n = graph.len();
    let adjacency = graph.adjacency();
    for i in 0..n {
        assert_eq!(adjacency[i][i], 0, "self-loop at {i}");
        for j in 0..n {
            assert_eq!(adjacency[i][j], adjacency[j][i], "asymmetric at ({i}, {j})");
        }
    }
    for edge in graph.edges() {
        assert!(graph.is_linked(edge.source, edge.target), "{edge:?} missing from matrix");
    }
    let pairs = graph.unique_pairs();
    for i in 0..n {
        for j in (i + 1)..n {
            assert_eq!(graph.is_linked(i, j), pairs.contains_key(&(i, j)), "({i}, {j})");
        }
    }
}

fn mixed_compendium() -> Compendium {
    compendium(&[
        "CCO",
        "CC=O",
        "CC(O)C",
        "CC(=O)C",
        "OCCO",
        "OCC=O",
        "CC(=O)OCC",
        "CC(=O)O",
        "c1ccccc1",
        "C",
        "CC[C@@H](C)O",
        "CCC(C)=O",
    ])
}

fn mixed_libraries() -> (RuleLibrary, RuleLibrary) {
    (
        library(
            &[PRIMARY_ALCOHOL_OXIDATION, SECONDARY_ALCOHOL_OXIDATION, ESTER_HYDROLYSIS],
            RuleCategory::Biological,
        ),
        library(&[KETONE_REDUCTION], RuleCategory::Chemical),
    )
}

#[test]
fn rule_turning_a_into_b_links_only_that_pair() {
    let c = compendium(&["CCO", "CC=O", "c1ccccc1"]);
    let bio = library(&[PRIMARY_ALCOHOL_OXIDATION], RuleCategory::Biological);
    let out = LinkageBuilder::default().build(&c, &bio, None).unwrap();

    let expected: Vec<Vec<u8>> = vec![vec![0, 1, 0], vec![1, 0, 0], vec![0, 0, 0]];
    assert_eq!(out.graph.adjacency(), expected.as_slice());
    assert_eq!(
        out.graph.unique_pairs().into_keys().collect::<Vec<(usize, usize)>>(),
        vec![(0, 1)]
    );
    assert_well_formed(&out.graph);
}

#[test]
fn symmetric_double_match_writes_one_edge() {
    // both CH2OH ends of ethylene glycol give glycolaldehyde
    let c = compendium(&["OCCO", "OCC=O"]);
    let bio = library(&[PRIMARY_ALCOHOL_OXIDATION], RuleCategory::Biological);
    let out = LinkageBuilder::default().build(&c, &bio, None).unwrap();
    assert_eq!(
        out.graph.edges(),
        [Edge {
            target: 1,
            source: 0,
            category: RuleCategory::Biological,
            rule: 0
        }]
    );
}

#[test]
fn molecule_without_matches_stays_isolated() {
    let c = compendium(&["C", "CCO", "CC=O"]);
    let bio = library(&[PRIMARY_ALCOHOL_OXIDATION], RuleCategory::Biological);
    let out = LinkageBuilder::default().build(&c, &bio, None).unwrap();
    assert_eq!(out.graph.neighbors(0).count(), 0);
    assert!(out.graph.is_linked(1, 2));
    // methane and acetaldehyde produce nothing
    assert_eq!(out.report.without_products, 2);
}

#[test]
fn graph_invariants_hold_on_a_mixed_compendium() {
    let c = mixed_compendium();
    let (bio, chem) = mixed_libraries();
    let out = LinkageBuilder::default().build(&c, &bio, Some(&chem)).unwrap();
    let g = &out.graph;
    assert_well_formed(g);

    assert!(g.is_linked(0, 1), "ethanol - acetaldehyde");
    assert!(g.is_linked(2, 3), "isopropanol - acetone");
    assert!(g.is_linked(4, 5), "glycol - glycolaldehyde");
    assert!(g.is_linked(6, 7), "ethyl acetate - acetic acid");
    assert!(g.is_linked(6, 0), "ethyl acetate - ethanol");
    assert!(g.is_linked(10, 11), "2-butanol - butanone");
    assert_eq!(g.neighbors(8).count(), 0);
    assert_eq!(g.neighbors(9).count(), 0);

    let categories: BTreeSet<_> = g.edges().iter().map(|e| e.category).collect();
    assert!(categories.contains(&RuleCategory::Chemical));
}

#[test]
fn builds_are_deterministic() {
    let c = mixed_compendium();
    let (bio, chem) = mixed_libraries();
    let first = LinkageBuilder::default().build(&c, &bio, Some(&chem)).unwrap();
    let second = LinkageBuilder::default().build(&c, &bio, Some(&chem)).unwrap();
    let parallel = LinkageBuilder::default()
        .with_execution(Execution::Parallel { workers: 4 })
        .build(&c, &bio, Some(&chem))
        .unwrap();
    assert_eq!(first.graph, second.graph);
    assert_eq!(first.graph, parallel.graph);
    assert_eq!(first.report, parallel.report);
}

#[test]
fn full_identity_key_separates_stereoisomers() {
    // reducing butanone gives 2-butanol without a configuration
    let smiles = ["CCC(C)=O", "CC[C@@H](C)O"];
    let rules = library(&[KETONE_REDUCTION], RuleCategory::Chemical);

    let coarse = LinkageBuilder::default()
        .build(&compendium(&smiles), &rules, None)
        .unwrap();
    assert!(coarse.graph.is_linked(0, 1));

    let exact = Canonicalizer::new(27);
    let strict = Compendium::from_structures(smiles, &exact);
    let out = LinkageBuilder::new(exact, TransformationEngine::default())
        .build(&strict, &rules, None)
        .unwrap();
    assert!(!out.graph.is_linked(0, 1));
}

#[test]
fn files_on_disk_drive_a_full_run() {
    let dir = tempfile::tempdir().unwrap();
    let compendium_path = dir.path().join("compendium.csv");
    fs::write(
        &compendium_path,
        "Name,Isomeric SMILES\nethanol,CCO\nacetaldehyde,CC=O\nbroken,C1CC\nisopropanol,CC(O)C\nacetone,CC(=O)C\n",
    )
    .unwrap();
    let bio_path = dir.path().join("BioTemplates.csv");
    fs::write(
        &bio_path,
        format!("name,template\nprimary,{PRIMARY_ALCOHOL_OXIDATION}\n"),
    )
    .unwrap();
    let chem_path = dir.path().join("templates_general.json");
    fs::write(
        &chem_path,
        format!("{{\"{SECONDARY_ALCOHOL_OXIDATION}\": 12, \"{KETONE_REDUCTION}\": 3}}"),
    )
    .unwrap();

    let canonicalizer = Canonicalizer::default();
    let c = Compendium::load(&compendium_path, "Isomeric SMILES", &canonicalizer).unwrap();
    assert_eq!((c.len(), c.dropped()), (4, 1));
    let bio = RuleLibrary::load(&bio_path, RuleCategory::Biological).unwrap();
    let chem = RuleLibrary::load(&chem_path, RuleCategory::Chemical).unwrap();
    assert_eq!((bio.len(), chem.len()), (1, 2));
    assert_eq!(chem.rules()[1].pattern_text(), KETONE_REDUCTION);

    let out = LinkageBuilder::default().build(&c, &bio, Some(&chem)).unwrap();
    assert_eq!(out.report.compendium_dropped, 1);
    assert_eq!(out.graph.unique_pairs().len(), 2);

    let out_dir = dir.path().join("out");
    let files = out.persist(&out_dir, &OutputNames::default()).unwrap();
    let adjacency = fs::read_to_string(&files.adjacency).unwrap();
    assert_eq!(
        adjacency,
        ",0,1,2,3\n0,0.0,1.0,0.0,0.0\n1,1.0,0.0,0.0,0.0\n2,0.0,0.0,0.0,1.0\n3,0.0,0.0,1.0,0.0\n"
    );
    let edges = fs::read_to_string(&files.edges).unwrap();
    // ethanol by the biological rule, isopropanol by oxidation, acetone by reduction
    assert_eq!(edges, ",0,1\n0,1,0\n1,3,2\n2,2,3\n");
    let structures = fs::read_to_string(&files.structures).unwrap();
    assert_eq!(structures.lines().count(), 4);

    let report_path = out_dir.join("report.json");
    out.write_report(&report_path).unwrap();
    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(report_path).unwrap()).unwrap();
    assert_eq!(report["molecules"], 4);
    assert_eq!(report["edges"], 3);
}

#[test]
fn malformed_rule_aborts_the_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.txt");
    fs::write(&path, format!("# oxidations\n{PRIMARY_ALCOHOL_OXIDATION}\n[C:1]>[O\n")).unwrap();
    let err = RuleLibrary::load(&path, RuleCategory::Biological).unwrap_err();
    assert!(matches!(err, taxlink::RuleLibraryError::Compile(ref f) if f.index == 1));
}
