//! Reduction of upstream nutrient lists to the four tracked macros.

use serde::{Deserialize, Serialize};

/// One of the four tracked macro nutrients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Macro {
    Energy,
    Protein,
    Carbohydrate,
    Fat,
}

impl Macro {
    pub const ALL: [Macro; 4] = [Macro::Energy, Macro::Protein, Macro::Carbohydrate, Macro::Fat];

    /// FoodData Central nutrient id.
    pub const fn nutrient_id(self) -> u32 {
        match self {
            Macro::Energy => 1008,
            Macro::Protein => 1003,
            Macro::Carbohydrate => 1005,
            Macro::Fat => 1004,
        }
    }

    /// Name stored in `food_nutrients.nutrient_name`.
    pub const fn nutrient_name(self) -> &'static str {
        match self {
            Macro::Energy => "Energy",
            Macro::Protein => "Protein",
            Macro::Carbohydrate => "Carbohydrate, by difference",
            Macro::Fat => "Total lipid (fat)",
        }
    }

    pub fn from_nutrient_id(id: u32) -> Option<Macro> {
        Macro::ALL.into_iter().find(|m| m.nutrient_id() == id)
    }

    pub fn from_nutrient_name(name: &str) -> Option<Macro> {
        Macro::ALL.into_iter().find(|m| m.nutrient_name() == name)
    }
}

/// A nutrient observation as reported upstream, before filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNutrient {
    pub id: u32,
    pub name: String,
    pub value: f64,
    pub unit_name: String,
}

/// A tracked macro value per 100 units of the food.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutrientValue {
    pub nutrient_name: String,
    pub value: f64,
    pub unit_name: String,
}

/// Keeps only the tracked macros. When a macro shows up more than once the
/// first observation wins and later ones are dropped.
pub fn normalize<I>(raw: I) -> Vec<NutrientValue>
where
    I: IntoIterator<Item = RawNutrient>,
{
    let mut out: Vec<NutrientValue> = Vec::with_capacity(Macro::ALL.len());
    for n in raw {
        let Some(m) = Macro::from_nutrient_id(n.id) else {
            continue;
        };
        if out.iter().any(|v| v.nutrient_name == m.nutrient_name()) {
            continue;
        }
        out.push(NutrientValue {
            nutrient_name: m.nutrient_name().to_string(),
            value: n.value,
            unit_name: n.unit_name,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: u32, name: &str, value: f64, unit: &str) -> RawNutrient {
        RawNutrient {
            id,
            name: name.into(),
            value,
            unit_name: unit.into(),
        }
    }

    #[test]
    fn keeps_only_the_four_macros() {
        let out = normalize(vec![
            raw(1008, "Energy", 52.0, "kcal"),
            raw(1087, "Calcium, Ca", 6.0, "mg"),
            raw(1003, "Protein", 0.26, "g"),
            raw(1005, "Carbohydrate, by difference", 13.81, "g"),
            raw(2000, "Sugars, total", 10.4, "g"),
            raw(1004, "Total lipid (fat)", 0.17, "g"),
        ]);
        assert_eq!(out.len(), 4);
        let names: Vec<_> = out.iter().map(|n| n.nutrient_name.as_str()).collect();
        for m in Macro::ALL {
            assert!(names.contains(&m.nutrient_name()));
        }
    }

    #[test]
    fn first_duplicate_wins() {
        let out = normalize(vec![
            raw(1008, "Energy", 200.0, "kcal"),
            raw(1008, "Energy", 837.0, "kJ"),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, 200.0);
        assert_eq!(out[0].unit_name, "kcal");
    }

    #[test]
    fn name_comes_from_the_id_mapping() {
        let out = normalize(vec![raw(1004, "Fat", 3.5, "g")]);
        assert_eq!(out[0].nutrient_name, "Total lipid (fat)");
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(normalize(Vec::new()).is_empty());
    }

    #[test]
    fn name_lookup_roundtrips() {
        for m in Macro::ALL {
            assert_eq!(Macro::from_nutrient_name(m.nutrient_name()), Some(m));
            assert_eq!(Macro::from_nutrient_id(m.nutrient_id()), Some(m));
        }
        assert_eq!(Macro::from_nutrient_name("Sugars, total"), None);
    }
}
