/*!
Integration tests for the normalization pipeline: determinism and the
identity-independence laws.
*/

use fnpool::core::hash::function_hash;
use fnpool::{normalize, PoolConfig};

fn config() -> PoolConfig {
    PoolConfig::with_root("/tmp/unused")
}

fn hash_of(source: &str) -> String {
    let result = normalize(source, &config()).unwrap();
    function_hash(&result.normalized_code_no_docstring)
}

const ENGLISH: &str = "def sum_list(items):\n    \"\"\"Sum a list\"\"\"\n    total = 0\n    for item in items:\n        total += item\n    return total\n";

const FRENCH: &str = "def somme_liste(elements):\n    \"\"\"Somme d'une liste\"\"\"\n    total = 0\n    for element in elements:\n        total += element\n    return total\n";

const SPANISH: &str = "def suma_lista(elementos):\n    \"\"\"Suma de una lista\"\"\"\n    total = 0\n    for elemento in elementos:\n        total += elemento\n    return total\n";

#[test]
fn test_normalization_is_deterministic() {
    let first = normalize(ENGLISH, &config()).unwrap();
    let second = normalize(ENGLISH, &config()).unwrap();
    assert_eq!(first.normalized_code, second.normalized_code);
    assert_eq!(
        first.normalized_code_no_docstring,
        second.normalized_code_no_docstring
    );
    assert_eq!(first.name_mapping, second.name_mapping);
    assert_eq!(hash_of(ENGLISH), hash_of(ENGLISH));
}

#[test]
fn test_three_languages_share_one_hash() {
    let english = hash_of(ENGLISH);
    assert_eq!(english, hash_of(FRENCH));
    assert_eq!(english, hash_of(SPANISH));
}

#[test]
fn test_docstring_does_not_affect_identity() {
    let reworded = ENGLISH.replace("Sum a list", "Returns the total of all items");
    assert_eq!(hash_of(ENGLISH), hash_of(&reworded));

    let missing = "def sum_list(items):\n    total = 0\n    for item in items:\n        total += item\n    return total\n";
    assert_eq!(hash_of(ENGLISH), hash_of(missing));
}

#[test]
fn test_docstring_recorded_verbatim() {
    let result = normalize(FRENCH, &config()).unwrap();
    assert_eq!(result.docstring, "Somme d'une liste");
}

#[test]
fn test_import_aliases_do_not_affect_identity() {
    let plain = "from math import sqrt\ndef norm(x, y):\n    return sqrt(x * x + y * y)\n";
    let aliased = "from math import sqrt as racine\ndef norme(a, b):\n    return racine(a * a + b * b)\n";
    assert_eq!(hash_of(plain), hash_of(aliased));
}

#[test]
fn test_pool_import_aliases_do_not_affect_identity() {
    let hash = "7".repeat(64);
    let aliased = format!(
        "from fnpool.pool import object_{hash} as helper\ndef f(x):\n    return helper(x)\n"
    );
    let unaliased = format!(
        "from fnpool.pool import object_{hash}\ndef f(x):\n    return object_{hash}(x)\n"
    );
    assert_eq!(hash_of(&aliased), hash_of(&unaliased));
}

#[test]
fn test_logic_changes_do_change_identity() {
    let subtract = ENGLISH.replace("total += item", "total -= item");
    assert_ne!(hash_of(ENGLISH), hash_of(&subtract));
}

#[test]
fn test_different_languages_produce_different_mappings() {
    let english = normalize(ENGLISH, &config()).unwrap();
    let french = normalize(FRENCH, &config()).unwrap();
    assert_ne!(english.name_mapping, french.name_mapping);

    let english_names: Vec<&String> = english.name_mapping.values().collect();
    assert!(english_names.contains(&&"sum_list".to_string()));
    let french_names: Vec<&String> = french.name_mapping.values().collect();
    assert!(french_names.contains(&&"somme_liste".to_string()));
}

#[test]
fn test_unicode_identifiers_survive() {
    let source = "def été(durée):\n    \"\"\"Durée de l'été\"\"\"\n    return durée * 2\n";
    let result = normalize(source, &config()).unwrap();
    let names: Vec<&String> = result.name_mapping.values().collect();
    assert!(names.contains(&&"été".to_string()));
    assert!(names.contains(&&"durée".to_string()));
}

#[test]
fn test_whitespace_differences_collapse() {
    let compact = "def sum_list(items):\n    \"\"\"Sum a list\"\"\"\n    total = 0\n    for item in items:\n        total += item\n    return total";
    assert_eq!(hash_of(ENGLISH), hash_of(compact));
}
