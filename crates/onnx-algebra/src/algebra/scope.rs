use std::collections::HashSet;

const DEFAULT_SEED: &str = "variable";

/// Naming authority guaranteeing unique variable and node names within one document.
#[derive(Debug, Clone)]
pub struct Scope {
    name: String,
    target_opset: u32,
    variable_names: HashSet<String>,
    operator_names: HashSet<String>,
}

impl Scope {
    /// Creates a scope where `reserved` names are already taken.
    pub fn new<I, S>(name: impl Into<String>, target_opset: u32, reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Scope {
            name: name.into(),
            target_opset,
            variable_names: reserved.into_iter().map(Into::into).collect(),
            operator_names: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target_opset(&self) -> u32 {
        self.target_opset
    }

    /// Returns `seed` if unused, otherwise `seed` followed by the first free counter.
    pub fn get_unique_variable_name(&mut self, seed: &str) -> String {
        generate_unique_name(seed, &mut self.variable_names)
    }

    /// Marks `name` as taken without renaming it. Returns `false` if it was already used.
    pub fn reserve_variable_name(&mut self, name: &str) -> bool {
        self.variable_names.insert(name.to_string())
    }

    pub fn get_unique_operator_name(&mut self, seed: &str) -> String {
        generate_unique_name(seed, &mut self.operator_names)
    }
}

fn generate_unique_name(seed: &str, existing: &mut HashSet<String>) -> String {
    let seed = if seed.is_empty() {
        DEFAULT_SEED.to_string()
    } else {
        seed.replace(' ', "_")
    };
    let mut candidate = seed.clone();
    let mut counter = 1usize;
    while existing.contains(&candidate) {
        candidate = format!("{seed}{counter}");
        counter += 1;
    }
    existing.insert(candidate.clone());
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_names_get_numeric_suffixes() {
        let mut scope = Scope::new("test", 12, ["X"]);
        assert_eq!(scope.get_unique_variable_name("X"), "X1");
        assert_eq!(scope.get_unique_variable_name("X"), "X2");
        assert_eq!(scope.get_unique_variable_name("Ad_C"), "Ad_C");
        assert_eq!(scope.get_unique_variable_name("Ad_C"), "Ad_C1");
    }

    #[test]
    fn operator_names_are_tracked_separately() {
        let mut scope = Scope::new("test", 12, ["Ad"]);
        assert_eq!(scope.get_unique_operator_name("Ad"), "Ad");
        assert_eq!(scope.get_unique_operator_name("Ad"), "Ad1");
    }

    #[test]
    fn empty_seed_falls_back_to_default() {
        let mut scope = Scope::new("test", 12, Vec::<String>::new());
        assert_eq!(scope.get_unique_variable_name(""), "variable");
        assert_eq!(scope.get_unique_variable_name("a b"), "a_b");
    }
}
