use expense_categorizer::{Classifier, ClassifierBuilder, ForestConfig, TrainingExample, TrainingSet};
use std::sync::Arc;
use std::thread;

const FOOD: [&str; 5] = [
    "bought groceries at mart",
    "grocery shopping at mart",
    "bought grocery items",
    "weekly grocery shopping",
    "grocery store run",
];
const BILLS: [&str; 5] = [
    "paid electricity bill",
    "electricity bill paid",
    "monthly electric bill",
    "bill payment for water",
    "paid phone bill",
];
const ENTERTAINMENT: [&str; 5] = [
    "movie tickets",
    "bought movie tickets",
    "movie tickets online",
    "cinema movie tickets",
    "tickets for movie night",
];
const TRANSPORT: [&str; 5] = [
    "bus fare",
    "paid bus fare",
    "city bus fare",
    "bus fare to work",
    "morning bus fare",
];

fn expense_examples() -> Vec<TrainingExample> {
    let mut examples = Vec::new();
    for (category, descriptions) in [
        ("Food", FOOD),
        ("Bills", BILLS),
        ("Entertainment", ENTERTAINMENT),
        ("Transport", TRANSPORT),
    ] {
        for description in descriptions {
            examples.push(TrainingExample::new(description, category));
        }
    }
    examples
}

fn setup_test_classifier() -> Classifier {
    let set = TrainingSet::new(expense_examples()).expect("valid training set");
    ClassifierBuilder::new()
        .with_training_set(&set)
        .build()
        .expect("Failed to create classifier")
}

#[test]
fn test_end_to_end_categorization() {
    let classifier = setup_test_classifier();

    assert_eq!(classifier.predict("grocery shopping").unwrap(), "Food");
    assert_eq!(classifier.predict("electric bill payment").unwrap(), "Bills");
}

#[test]
fn test_predictions_stay_within_training_labels() {
    let classifier = setup_test_classifier();
    let labels = TrainingSet::new(expense_examples()).unwrap().label_set();

    for probe in [
        "grocery shopping",
        "taxi to the airport",
        "birthday present for mom",
        "x",
        "1234",
        "movie",
    ] {
        let label = classifier.predict(probe).unwrap();
        assert!(labels.contains(&label), "{} -> {} is not a training label", probe, label);
    }
}

#[test]
fn test_default_split_holds_out_a_fifth() {
    let classifier = setup_test_classifier();
    let report = classifier.report();
    assert_eq!(report.train_rows, 16);
    assert_eq!(report.test_rows, 4);
    assert!(report.held_out_accuracy.is_some());
    assert_eq!(classifier.info().n_trees, 100);
}

#[test]
fn test_same_seed_same_predictions() {
    let a = setup_test_classifier();
    let b = setup_test_classifier();

    for probe in ["grocery shopping", "late night bus", "phone", "tickets", "random words here"] {
        assert_eq!(
            a.predict_with_scores(probe).unwrap(),
            b.predict_with_scores(probe).unwrap()
        );
    }
}

#[test]
fn test_scores_sum_to_one() {
    let classifier = setup_test_classifier();
    let (label, scores) = classifier.predict_with_scores("paid the water bill").unwrap();

    assert_eq!(scores.len(), 4);
    let total: f32 = scores.values().sum();
    assert!((total - 1.0).abs() < 1e-4);
    let best = scores.iter().max_by(|a, b| a.1.total_cmp(b.1)).unwrap();
    assert_eq!(best.1, &scores[&label]);
}

#[test]
fn test_labels_outside_fallback_list() {
    let classifier = Classifier::builder()
        .with_config(ForestConfig::default().with_trees(60))
        .with_test_size(0.0)
        .add_example("pharmacy prescription", "Health").unwrap()
        .add_example("pharmacy vitamins", "Health").unwrap()
        .add_example("doctor visit copay", "Health").unwrap()
        .add_example("bus fare", "Transport").unwrap()
        .add_example("taxi fare", "Transport").unwrap()
        .build()
        .unwrap();

    assert_eq!(classifier.predict("pharmacy prescription refill").unwrap(), "Health");
}

#[test]
fn test_thread_safety() {
    let classifier = Arc::new(setup_test_classifier());
    let mut handles = vec![];

    for _ in 0..3 {
        let classifier = Arc::clone(&classifier);
        let handle = thread::spawn(move || {
            let result = classifier.predict("weekly grocery shopping");
            assert!(result.is_ok());
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_classifier_thread_safety() {
    let classifier = setup_test_classifier();

    // Test that classifier can be sent to another thread
    thread::spawn(move || {
        classifier.predict("bus fare").unwrap();
    }).join().unwrap();
}
