use super::*;
use std::sync::Arc;
use std::thread;

fn prop(name: &str, applies_to: &[&str]) -> Property {
    Property::new(name, PropertyType::String, "", applies_to.iter().copied()).unwrap()
}

fn registry_with(names: &[&str]) -> PropertyRegistry {
    let registry = PropertyRegistry::new();
    for name in names {
        registry.register(prop(name, &["object"])).unwrap();
    }
    registry
}

// ============================================================================
// Property construction
// ============================================================================

#[test]
fn test_new_property_valid() {
    let property = Property::new(
        "health",
        PropertyType::Number,
        "property.set.health",
        ["character"],
    )
    .unwrap();

    assert_eq!(property.name(), "health");
    assert_eq!(property.property_type(), PropertyType::Number);
    assert_eq!(property.capability(), "property.set.health");
    assert_eq!(property.applies_to().collect::<Vec<_>>(), ["character"]);
}

#[test]
fn test_new_property_empty_capability_and_applies_to() {
    let property = Property::new("notes", PropertyType::Text, "", Vec::<String>::new()).unwrap();
    assert_eq!(property.capability(), "");
    assert_eq!(property.applies_to().count(), 0);
}

#[test]
fn test_new_property_invalid_name() {
    for name in ["", "   ", "\t\n"] {
        let err = Property::new(name, PropertyType::String, "", ["object"]).unwrap_err();
        assert_eq!(err, PropertyError::InvalidName);
        assert_eq!(err.to_string(), "property name cannot be empty");
    }
}

#[test]
fn test_property_type_parse() {
    assert_eq!("string".parse::<PropertyType>(), Ok(PropertyType::String));
    assert_eq!("text".parse::<PropertyType>(), Ok(PropertyType::Text));
    assert_eq!("number".parse::<PropertyType>(), Ok(PropertyType::Number));
    assert_eq!("bool".parse::<PropertyType>(), Ok(PropertyType::Bool));
    assert_eq!(
        "integer".parse::<PropertyType>(),
        Err(PropertyError::InvalidType("integer".to_string()))
    );
    assert!("".parse::<PropertyType>().is_err());
    assert!("String".parse::<PropertyType>().is_err());
    assert_eq!(PropertyType::Bool.to_string(), "bool");
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn test_resolve_exact_match() {
    let registry = PropertyRegistry::default_registry();
    let property = registry.resolve("description").unwrap();
    assert_eq!(property.name(), "description");
    assert_eq!(property.property_type(), PropertyType::Text);
}

#[test]
fn test_resolve_unique_prefix() {
    let registry = PropertyRegistry::default_registry();
    for input in ["d", "desc", "descriptio"] {
        assert_eq!(registry.resolve(input).unwrap().name(), "description");
    }
    assert_eq!(registry.resolve("na").unwrap().name(), "name");
}

#[test]
fn test_resolve_exact_match_wins_over_prefix() {
    let registry = registry_with(&["name", "named", "namespace"]);
    assert_eq!(registry.resolve("name").unwrap().name(), "name");
}

#[test]
fn test_resolve_ambiguous() {
    let registry = registry_with(&["description", "dark_mode"]);
    let err = registry.resolve("d").unwrap_err();

    assert_eq!(
        err,
        PropertyError::Ambiguous {
            prefix: "d".to_string(),
            matches: vec!["dark_mode".to_string(), "description".to_string()],
        }
    );
    assert_eq!(err.to_string(), "ambiguous property 'd': dark_mode, description");
}

#[test]
fn test_resolve_ambiguous_matches_sorted_regardless_of_insert_order() {
    let registry = registry_with(&["notes", "nickname", "name"]);
    match registry.resolve("n") {
        Err(PropertyError::Ambiguous { prefix, matches }) => {
            assert_eq!(prefix, "n");
            assert_eq!(matches, ["name", "nickname", "notes"]);
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }
}

#[test]
fn test_resolve_ambiguous_excludes_non_matching_neighbours() {
    let registry = registry_with(&["name", "notes", "o", "m"]);
    match registry.resolve("n") {
        Err(PropertyError::Ambiguous { matches, .. }) => assert_eq!(matches, ["name", "notes"]),
        other => panic!("expected ambiguity, got {other:?}"),
    }
}

#[test]
fn test_resolve_not_found() {
    let registry = PropertyRegistry::default_registry();
    assert_eq!(
        registry.resolve("xyz"),
        Err(PropertyError::NotFound("xyz".to_string()))
    );
    // Longer than any registered name
    assert!(matches!(
        registry.resolve("descriptions"),
        Err(PropertyError::NotFound(_))
    ));
}

#[test]
fn test_resolve_empty_registry() {
    let registry = PropertyRegistry::new();
    assert!(matches!(registry.resolve("anything"), Err(PropertyError::NotFound(_))));
    assert!(matches!(registry.resolve(""), Err(PropertyError::NotFound(_))));
}

#[test]
fn test_resolve_empty_input_is_not_a_prefix() {
    let registry = PropertyRegistry::default_registry();
    assert!(matches!(registry.resolve(""), Err(PropertyError::NotFound(_))));
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_register_duplicate_keeps_original() {
    let registry = PropertyRegistry::new();
    let original = Property::new("mood", PropertyType::String, "cap.one", ["character"]).unwrap();
    let replacement = Property::new("mood", PropertyType::Bool, "cap.two", ["exit"]).unwrap();

    registry.register(original.clone()).unwrap();
    let err = registry.register(replacement).unwrap_err();

    assert_eq!(err, PropertyError::Duplicate("mood".to_string()));
    assert_eq!(err.to_string(), "property already registered: mood");
    assert_eq!(registry.resolve("mood").unwrap(), original);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_register_different_names() {
    let registry = registry_with(&["alpha", "beta"]);
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.names(), ["alpha", "beta"]);
    assert!(!registry.is_empty());
}

#[test]
#[should_panic(expected = "property already registered: name")]
fn test_must_register_panics_on_duplicate() {
    let registry = PropertyRegistry::default_registry();
    registry.must_register(prop("name", &["object"]));
}

#[test]
fn test_must_register_success() {
    let registry = PropertyRegistry::new();
    registry.must_register(prop("colour", &["object"]));
    assert!(registry.valid_for("object", "colour"));
}

// ============================================================================
// Validity
// ============================================================================

#[test]
fn test_default_registry_catalog() {
    let registry = PropertyRegistry::default_registry();
    assert_eq!(registry.len(), 2);

    let description = registry.resolve("description").unwrap();
    assert_eq!(description.capability(), "property.set.description");
    assert_eq!(
        description.applies_to().collect::<Vec<_>>(),
        ["character", "exit", "location", "object"]
    );

    let name = registry.resolve("name").unwrap();
    assert_eq!(name.property_type(), PropertyType::String);
    assert_eq!(name.capability(), "property.set.name");
    assert!(!name.applies_to_entity("character"));
}

#[test]
fn test_valid_for() {
    let registry = PropertyRegistry::default_registry();
    let cases = [
        ("location", "description", true),
        ("object", "description", true),
        ("character", "description", true),
        ("exit", "description", true),
        ("location", "name", true),
        ("exit", "name", true),
        ("character", "name", false),
        ("vehicle", "description", false),
        ("location", "nonexistent", false),
        ("location", "desc", false),
        ("", "description", false),
        ("location", "", false),
        ("", "", false),
    ];

    for (entity_type, property, expected) in cases {
        assert_eq!(
            registry.valid_for(entity_type, property),
            expected,
            "valid_for({entity_type:?}, {property:?})"
        );
    }
}

#[test]
fn test_valid_for_empty_registry() {
    let registry = PropertyRegistry::new();
    assert!(!registry.valid_for("location", "description"));
}

#[test]
fn test_valid_for_property_without_entity_types() {
    let registry = PropertyRegistry::new();
    registry
        .register(Property::new("secret", PropertyType::Bool, "", Vec::<String>::new()).unwrap())
        .unwrap();
    assert!(!registry.valid_for("object", "secret"));
    assert!(registry.resolve("sec").is_ok());
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_register_and_resolve() {
    let registry = Arc::new(PropertyRegistry::default_registry());
    let mut handles = Vec::new();

    for worker in 0..8 {
        let registry = Arc::clone(&registry);
        handles.push(thread::spawn(move || {
            for i in 0..50 {
                // Workers overlap on half of the names so duplicates race
                let name = format!("prop_{}_{i}", worker % 4);
                let _ = registry.register(prop(&name, &["object"]));

                assert_eq!(registry.resolve("description").unwrap().name(), "description");
                assert!(registry.valid_for("exit", "name"));
                match registry.resolve("prop_") {
                    Ok(_) | Err(PropertyError::Ambiguous { .. }) => {}
                    Err(e) => panic!("unexpected resolve error: {e}"),
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.len(), 2 + 4 * 50);
    for group in 0..4 {
        for i in 0..50 {
            let name = format!("prop_{group}_{i}");
            assert_eq!(registry.resolve(&name).unwrap().name(), name);
        }
    }
}

// ============================================================================
// Built-in catalog
// ============================================================================

#[test]
fn test_builtin_catalog_registers_every_seed() {
    let registry = PropertyRegistry::default_registry();
    assert_eq!(registry.len(), DEFAULT_CATALOG.len());
    for &(name, property_type, capability, applies_to) in DEFAULT_CATALOG {
        let property = registry.resolve(name).unwrap();
        assert_eq!(property.property_type(), property_type);
        assert_eq!(property.capability(), capability);

        let mut expected = applies_to.to_vec();
        expected.sort_unstable();
        assert_eq!(property.applies_to().collect::<Vec<_>>(), expected);
    }
}

#[test]
#[should_panic(expected = "invalid built-in property \"\": property name cannot be empty")]
fn test_builtin_seed_with_empty_name_panics() {
    PropertyRegistry::from_seeds(&[
        ("notes", PropertyType::Text, "", &["object"]),
        ("", PropertyType::Text, "", &["object"]),
    ]);
}

#[test]
#[should_panic(expected = "property already registered: notes")]
fn test_builtin_seed_duplicate_panics() {
    PropertyRegistry::from_seeds(&[
        ("notes", PropertyType::Text, "", &["object"]),
        ("notes", PropertyType::String, "", &["exit"]),
    ]);
}
