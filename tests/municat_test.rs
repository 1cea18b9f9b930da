use delimit_qa::core::municat::{FITA_TEMP_LAYER, TRAM_TEMP_LAYER};
use delimit_qa::domain::model::{Feature, Geometry, Layer};
use delimit_qa::domain::ports::LayerStore;
use delimit_qa::{MunicatGenerator, QaConfig, SqliteStore};
use std::fs;
use std::io::Read;
use tempfile::TempDir;

fn config_in(dir: &TempDir) -> QaConfig {
    let mut config = QaConfig::default();
    config.paths.work_store = dir.path().join("work.sqlite");
    config.paths.log_dir = dir.path().join("logs");
    config.municat.input_csv = dir.path().join("MTT.csv");
    config.municat.output_dir = dir.path().join("out");
    config
}

fn seed_store(config: &QaConfig) -> SqliteStore {
    let store = SqliteStore::open(&config.paths.work_store).unwrap();
    let fields = vec![
        "id_linia".to_string(),
        "id_sessio_".to_string(),
        "id_u_fita".to_string(),
    ];
    let fita = |line: i64, session: &str, id: &str, x: f64| {
        Feature::new(Some(Geometry::point(x, 0.0)))
            .with("id_linia", line)
            .with("id_sessio_", session)
            .with("id_u_fita", id)
    };
    store
        .write_layer(&Layer::new("fita_mem", fields).with_features(vec![
            fita(7, "S1", "70010", 0.0),
            fita(7, "S1", "70020", 10.0),
            fita(7, "S1", "70031", 20.0),
            fita(12, "S4", "120010", 0.0),
        ]))
        .unwrap();

    let tram = |line: i64, session: &str| {
        Feature::new(Some(Geometry::line(vec![(0.0, 0.0), (10.0, 0.0)])))
            .with("id_linia", line)
            .with("id_sessio_", session)
    };
    store
        .write_layer(
            &Layer::new(
                "tram_linia_mem",
                vec!["id_linia".to_string(), "id_sessio_".to_string()],
            )
            .with_features(vec![tram(7, "S1"), tram(12, "S4")]),
        )
        .unwrap();
    store
}

fn read_entry(path: &std::path::Path, name: &str) -> String {
    let mut archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    let mut content = String::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    content
}

#[test]
fn test_municat_builds_one_package_per_row() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    fs::write(&config.municat.input_csv, "7,S1,20200101,3\n12, S4, 20210505, 1\n").unwrap();
    let generator = MunicatGenerator::new(&config, seed_store(&config));

    let packages = generator.run().unwrap();

    assert_eq!(packages.len(), 2);
    assert!(packages[0].ends_with("MTT_0007_20200101_3.zip"));
    assert!(packages[1].ends_with("MTT_0012_20210505_1.zip"));

    let fites = read_entry(&packages[0], "Fita_mem_0007.csv");
    assert!(fites.contains("70010"));
    assert!(fites.contains("70020"));
    assert!(!fites.contains("70031"));
    let trams = read_entry(&packages[0], "Line_tram_mem_0007.csv");
    assert_eq!(trams.lines().count(), 2);

    // the temporary layers hold the last extracted line
    let fita_temp = generator.store().read_layer(FITA_TEMP_LAYER).unwrap().unwrap();
    assert_eq!(fita_temp.texts("id_u_fita"), vec!["120010"]);
    assert!(generator.store().read_layer(TRAM_TEMP_LAYER).unwrap().is_some());

    let log = fs::read_dir(&config.paths.log_dir).unwrap().next().unwrap().unwrap();
    let content = fs::read_to_string(log.path()).unwrap();
    assert!(content.contains("Line 12 exported to"));
}

#[test]
fn test_municat_stops_at_unknown_session() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    fs::write(&config.municat.input_csv, "7,S1,20200101,3\n7,S9,20200101,4\n12,S4,20210505,1\n").unwrap();
    let generator = MunicatGenerator::new(&config, seed_store(&config));

    let err = generator.run().unwrap_err();

    assert!(err.to_string().contains("The session ID S9 does not exist"));
    assert!(config.municat.output_dir.join("MTT_0007_20200101_3.zip").is_file());
    assert!(!config.municat.output_dir.join("MTT_0012_20210505_1.zip").exists());
}
