use coredb::{DbError, MonitorKind, Outcome, Session, TransactionError, ValueErrorKind};

const RELAXATION: &str = "/numericalConditions/underRelaxationFactors/pressure";
const TIME_STEP: &str = "/runCalculation/runConditions/timeStepSize";

fn session() -> Session {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session = Session::new().unwrap();
    session.create().unwrap();
    session
}

#[test]
fn test_set_value_on_fresh_document() {
    let mut session = session();
    let db = session.db_mut().unwrap();
    let before = db.config_count();

    db.set_value("/general/timeTransient", "true").unwrap();

    assert_eq!(db.get_value("/general/timeTransient").unwrap(), "true");
    assert_eq!(db.config_count(), before + 1);
}

#[test]
fn test_cell_zone_ids_are_sequential() {
    let mut session = session();
    let db = session.db_mut().unwrap();
    db.add_region("r1").unwrap();

    assert_eq!(db.add_cell_zone("r1", "z1").unwrap(), 1);
    assert_eq!(db.add_cell_zone("r1", "z2").unwrap(), 2);
    assert!(matches!(db.add_cell_zone("r1", "z1"), Err(DbError::Exists { .. })));
}

#[test]
fn test_failed_field_rolls_back_earlier_fields() {
    let mut session = session();
    let db = session.db_mut().unwrap();
    let before = db.get_value("/general/timeTransient").unwrap();
    let count = db.config_count();

    let err = db
        .transaction(|db| {
            db.set_labeled_value("/general/timeTransient", "true", Some("Transient"))?;
            db.set_labeled_value(RELAXATION, "7", Some("Pressure"))
        })
        .unwrap_err();

    let errors = err.value_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ValueErrorKind::OutOfRange);
    assert_eq!(errors[0].label.as_deref(), Some("Pressure"));
    assert_eq!(db.get_value("/general/timeTransient").unwrap(), before);
    assert_eq!(db.config_count(), count);
}

#[test]
fn test_atomicity_for_every_failing_position() {
    let steps: [(&str, &str); 4] = [
        ("/general/timeTransient", "true"),
        ("/general/solverType", "densityBased"),
        ("/runCalculation/runConditions/endTime", "5"),
        (RELAXATION, "0.5"),
    ];

    for k in 0..=steps.len() {
        let mut session = session();
        let db = session.db_mut().unwrap();
        let before = db.root().clone();

        let mut batch: Vec<(&str, &str)> = steps.to_vec();
        batch.insert(k, (RELAXATION, "-1"));

        let result = db.transaction(|db| {
            db.add_region("fluid")?;
            for (path, value) in &batch {
                db.set_value(path, value)?;
            }
            Ok(())
        });

        assert!(
            matches!(result, Err(TransactionError::Rejected(_))),
            "failure at {k}"
        );
        assert_eq!(db.root(), &before, "tree changed with failure at {k}");
        assert_eq!(db.config_count(), 0);
        assert!(!db.in_transaction());
    }
}

#[test]
fn test_batch_collects_every_rejection() {
    let mut session = session();
    let db = session.db_mut().unwrap();
    let before = db.root().clone();

    let batch = coredb::WriteBatch::new()
        .set_labeled_value(RELAXATION, "2", "Pressure")
        .set_value("/general/timeTransient", "true")
        .set_labeled_value("/numericalConditions/maxIterationsPerTimeStep", "x", "Iterations");
    let err = db.apply(batch).unwrap_err();

    let kinds: Vec<_> = err.value_errors().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, [ValueErrorKind::OutOfRange, ValueErrorKind::IntegerOnly]);
    assert_eq!(db.root(), &before);
}

#[test]
fn test_cancelled_transaction_is_not_an_error() {
    let mut session = session();
    let db = session.db_mut().unwrap();
    let before = db.root().clone();

    let outcome = db
        .transaction(|db| {
            db.set_value("/general/timeTransient", "true")?;
            Err::<(), _>(DbError::Cancel)
        })
        .unwrap();

    assert_eq!(outcome, Outcome::Cancelled);
    assert_eq!(db.root(), &before);
}

#[test]
fn test_ids_are_reused_after_removal() {
    let mut session = session();
    let db = session.db_mut().unwrap();

    let first = db.add_monitor(MonitorKind::Force).unwrap();
    let second = db.add_monitor(MonitorKind::Force).unwrap();
    assert_eq!(first, "force-mon-1");
    assert_eq!(second, "force-mon-2");

    db.remove_monitor(MonitorKind::Force, &first).unwrap();
    assert_eq!(db.add_monitor(MonitorKind::Force).unwrap(), first);

    db.add_region("r").unwrap();
    let zones = "/regions/region/cellZones/cellZone";
    let id = db.available_id(zones, "czid").unwrap();
    db.add_cell_zone("r", "a").unwrap();
    assert_ne!(db.available_id(zones, "czid").unwrap(), id);
    db.remove_element(&format!("{zones}[@czid=\"{id}\"]")).unwrap();
    assert_eq!(db.available_id(zones, "czid").unwrap(), id);
}

#[test]
fn test_batch_parameter_indirection() {
    let mut session = session();
    let db = session.db_mut().unwrap();
    db.add_batch_parameter("P", "12.5").unwrap();

    db.set_value(TIME_STEP, "$P").unwrap();
    assert_eq!(db.get_value(TIME_STEP).unwrap(), "$P");
    assert_eq!(db.get_float(TIME_STEP).unwrap(), 12.5);

    let parameters = db.get_batch_parameters().unwrap();
    assert_eq!(parameters[0].name, "P");
    assert_eq!(parameters[0].usages, 1);
    assert!(matches!(
        db.remove_batch_parameter("P"),
        Err(DbError::Value(e)) if e.kind == ValueErrorKind::Referenced
    ));

    db.add_batch_parameter("N", "-1").unwrap();
    let err = db.set_value(TIME_STEP, "$N").unwrap_err();
    assert_eq!(err.as_value_error().unwrap().kind, ValueErrorKind::OutOfRange);
    assert_eq!(db.get_value(TIME_STEP).unwrap(), "$P");

    db.set_value(TIME_STEP, "0.01").unwrap();
    assert_eq!(db.get_value(TIME_STEP).unwrap(), "0.01");
    db.remove_batch_parameter("P").unwrap();
}

#[test]
fn test_undeclared_parameter_is_a_literal() {
    let mut session = session();
    let db = session.db_mut().unwrap();
    let before = db.get_value(TIME_STEP).unwrap();

    let err = db.set_value(TIME_STEP, "$undeclared").unwrap_err();
    assert_eq!(err.as_value_error().unwrap().kind, ValueErrorKind::FloatOnly);
    assert_eq!(err.as_value_error().unwrap().value, "$undeclared");
    assert!(db.get_element(TIME_STEP).unwrap().attribute("batchParameter").is_none());
    assert_eq!(db.get_value(TIME_STEP).unwrap(), before);
    assert_eq!(db.config_count(), 0);
}

#[test]
fn test_empty_text_reads_as_empty_string() {
    let mut session = session();
    let db = session.db_mut().unwrap();

    let polynomial = "/materials/material[@mid=\"1\"]/density/polynomial";
    assert!(db.get_element(polynomial).unwrap().text().is_none());
    assert_eq!(db.get_value(polynomial).unwrap(), "");
    assert_eq!(
        db.get_value("/models/userDefinedScalars/scalar[@scalarID=\"0\"]/fieldName")
            .unwrap(),
        ""
    );

    db.set_value(polynomial, "1 2").unwrap();
    db.set_value(polynomial, "").unwrap();
    assert_eq!(db.get_value(polynomial).unwrap(), "");
}

#[test]
fn test_bulk_round_trip_keeps_subtree() {
    let mut session = session();
    let db = session.db_mut().unwrap();
    db.add_region("fluid").unwrap();
    db.add_cell_zone("fluid", "rotor").unwrap();

    let path = "/regions/region[name=\"fluid\"]";
    let before = db.get_element(path).unwrap().clone();
    let value = db.get_bulk(path).unwrap();

    let outcome = db.transaction(|db| db.set_bulk(path, &value)).unwrap();
    assert!(outcome.is_committed());
    assert_eq!(db.get_element(path).unwrap(), &before);
}

#[test]
fn test_range_enforcement_and_counter() {
    let mut session = session();
    let db = session.db_mut().unwrap();

    for bad in ["1.01", "-0.1", "abc"] {
        assert!(db.set_value(RELAXATION, bad).is_err());
        assert_eq!(db.config_count(), 0);
    }

    db.set_value(RELAXATION, "0.3").unwrap();
    assert_eq!(db.config_count(), 0);
    db.set_value(RELAXATION, "1").unwrap();
    assert_eq!(db.config_count(), 1);
    db.set_value(RELAXATION, "0").unwrap();
    assert_eq!(db.config_count(), 2);
}

#[test]
fn test_singular_match_leaves_tree_unchanged() {
    let mut session = session();
    let db = session.db_mut().unwrap();
    db.add_region("a").unwrap();
    db.add_region("b").unwrap();
    let before = db.root().clone();
    let count = db.config_count();

    for result in [
        db.set_value("/regions/region/name", "c"),
        db.clear_element("/regions/region"),
        db.add_element_from_string("/regions/region/cellZones", "<cellZone czid=\"9\"/>"),
        db.set_value("/regions/region[name=\"none\"]/name", "c"),
    ] {
        assert!(matches!(result, Err(DbError::Lookup { .. })));
    }
    assert_eq!(db.root(), &before);
    assert_eq!(db.config_count(), count);
}

#[test]
fn test_save_and_reload_through_session() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("project.tar");

    let mut session = session();
    let db = session.db_mut().unwrap();
    db.add_region("fluid").unwrap();
    let bc = db
        .add_boundary_condition("fluid", "inlet", None, "velocityInlet")
        .unwrap();
    db.add_monitor(MonitorKind::Point).unwrap();
    db.save_as(&file).unwrap();

    session.destroy();
    let db = session.load(&file).unwrap();
    assert!(!db.is_modified());
    assert_eq!(db.get_regions().unwrap(), ["fluid"]);
    assert_eq!(db.get_boundary_conditions("fluid").unwrap()[0].id, bc);
    assert_eq!(db.get_monitors(MonitorKind::Point).unwrap(), ["point-mon-1"]);
}
