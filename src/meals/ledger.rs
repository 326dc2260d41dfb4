use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// No more meals can be added once a ledger holds this many.
pub const MAX_MEALS: usize = 10;

/// One nutrition entry. Macro fields are kept as entered and only
/// coerced to numbers when totals are computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fat: String,
    #[serde(default)]
    pub carbs: String,
    #[serde(default)]
    pub protein: String,
    #[serde(default)]
    pub calories: String,
    #[serde(default)]
    pub eaten: bool,
}

impl Meal {
    pub fn empty(id: u32) -> Self {
        Self {
            id,
            name: String::new(),
            description: String::new(),
            fat: String::new(),
            carbs: String::new(),
            protein: String::new(),
            calories: String::new(),
            eaten: false,
        }
    }

    pub fn field(&self, field: MealField) -> &str {
        match field {
            MealField::Name => &self.name,
            MealField::Description => &self.description,
            MealField::Fat => &self.fat,
            MealField::Carbs => &self.carbs,
            MealField::Protein => &self.protein,
            MealField::Calories => &self.calories,
        }
    }

    fn field_mut(&mut self, field: MealField) -> &mut String {
        match field {
            MealField::Name => &mut self.name,
            MealField::Description => &mut self.description,
            MealField::Fat => &mut self.fat,
            MealField::Carbs => &mut self.carbs,
            MealField::Protein => &mut self.protein,
            MealField::Calories => &mut self.calories,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealField {
    Name,
    Description,
    Fat,
    Carbs,
    Protein,
    Calories,
}

impl MealField {
    pub const ALL: [MealField; 6] = [
        MealField::Name,
        MealField::Description,
        MealField::Fat,
        MealField::Carbs,
        MealField::Protein,
        MealField::Calories,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MealField::Name => "name",
            MealField::Description => "description",
            MealField::Fat => "fat",
            MealField::Carbs => "carbs",
            MealField::Protein => "protein",
            MealField::Calories => "calories",
        }
    }
}

impl fmt::Display for MealField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown meal field: {0}")]
pub struct UnknownField(pub String);

impl FromStr for MealField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MealField::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// Sums over eaten meals. Never stored; recomputed from the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub calories: f64,
    pub protein: f64,
}

/// Blank or non-numeric text counts as zero.
pub fn numeric(value: &str) -> f64 {
    match value.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => 0.0,
    }
}

/// Ordered meals for one user on one day. Insertion order is display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    meals: Vec<Meal>,
}

impl Ledger {
    pub fn seed() -> Self {
        Self {
            meals: vec![Meal::empty(1)],
        }
    }

    pub fn from_meals(meals: Vec<Meal>) -> Self {
        Self { meals }
    }

    pub fn meals(&self) -> &[Meal] {
        &self.meals
    }

    pub fn len(&self) -> usize {
        self.meals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meals.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.meals.len() >= MAX_MEALS
    }

    pub fn get(&self, id: u32) -> Option<&Meal> {
        self.meals.iter().find(|m| m.id == id)
    }

    /// The new id is `len + 1`, so after a deletion it can collide with a
    /// meal that is still present.
    pub fn add_meal(&mut self) -> Option<u32> {
        if self.is_full() {
            return None;
        }
        let id = self.meals.len() as u32 + 1;
        self.meals.push(Meal::empty(id));
        Some(id)
    }

    /// Removes the first meal with `id`. Remaining ids are not renumbered.
    pub fn delete_meal(&mut self, id: u32) -> Option<Meal> {
        let idx = self.meals.iter().position(|m| m.id == id)?;
        Some(self.meals.remove(idx))
    }

    pub fn update_field(&mut self, id: u32, field: MealField, value: impl Into<String>) -> bool {
        match self.meals.iter_mut().find(|m| m.id == id) {
            Some(meal) => {
                *meal.field_mut(field) = value.into();
                true
            }
            None => false,
        }
    }

    pub fn toggle_eaten(&mut self, id: u32) -> Option<bool> {
        let meal = self.meals.iter_mut().find(|m| m.id == id)?;
        meal.eaten = !meal.eaten;
        Some(meal.eaten)
    }

    pub fn totals(&self) -> Totals {
        self.meals
            .iter()
            .filter(|m| m.eaten)
            .fold(Totals::default(), |acc, m| Totals {
                calories: acc.calories + numeric(&m.calories),
                protein: acc.protein + numeric(&m.protein),
            })
    }
}

pub fn compute_totals(ledger: &Ledger) -> Totals {
    ledger.totals()
}
