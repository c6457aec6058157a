use serde::{Deserialize, Serialize};

use super::enums::{BmiCategory, Gender};
use super::{check_range, ValidationError};

pub const MAX_AGE: u32 = 120;
pub const HEIGHT_RANGE_CM: (f64, f64) = (50.0, 300.0);
pub const WEIGHT_RANGE_KG: (f64, f64) = (10.0, 300.0);

/// Raw profile submission as entered on the form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub email: String,
    pub phone: String,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub allergies: String,
    pub medical_history: String,
}

/// A validated patient profile. BMI is derived from height and weight on
/// construction and cannot be set independently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    name: String,
    age: u32,
    gender: Gender,
    email: String,
    phone: String,
    height_cm: f64,
    weight_kg: f64,
    bmi: f64,
    allergies: String,
    medical_history: String,
}

impl Profile {
    /// Validate a submission. Nothing partial is ever produced.
    pub fn from_form(form: ProfileForm) -> Result<Self, ValidationError> {
        let name = form.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::Required("name"));
        }
        if form.age == 0 {
            return Err(ValidationError::Required("age"));
        }
        check_range("age", f64::from(form.age), 1.0, f64::from(MAX_AGE))?;
        check_range("height_cm", form.height_cm, HEIGHT_RANGE_CM.0, HEIGHT_RANGE_CM.1)?;
        check_range("weight_kg", form.weight_kg, WEIGHT_RANGE_KG.0, WEIGHT_RANGE_KG.1)?;

        Ok(Self {
            name,
            age: form.age,
            gender: form.gender,
            email: form.email.trim().to_string(),
            phone: form.phone.trim().to_string(),
            height_cm: form.height_cm,
            weight_kg: form.weight_kg,
            bmi: compute_bmi(form.height_cm, form.weight_kg),
            allergies: form.allergies.trim().to_string(),
            medical_history: form.medical_history.trim().to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn height_cm(&self) -> f64 {
        self.height_cm
    }

    pub fn weight_kg(&self) -> f64 {
        self.weight_kg
    }

    pub fn bmi(&self) -> f64 {
        self.bmi
    }

    pub fn bmi_category(&self) -> BmiCategory {
        categorize_bmi(self.bmi)
    }

    pub fn allergies(&self) -> &str {
        &self.allergies
    }

    pub fn medical_history(&self) -> &str {
        &self.medical_history
    }

    /// Labelled display fields in form order. Empty text fields are included
    /// as empty strings; callers decide whether to skip them.
    pub fn display_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Name", self.name.clone()),
            ("Age", self.age.to_string()),
            ("Gender", self.gender.as_str().to_string()),
            ("Email", self.email.clone()),
            ("Phone", self.phone.clone()),
            ("Height", format!("{} cm", self.height_cm)),
            ("Weight", format!("{} kg", self.weight_kg)),
            ("BMI", format!("{:.1}", self.bmi)),
            ("Allergies", self.allergies.clone()),
            ("Medical History", self.medical_history.clone()),
        ]
    }
}

/// weight / (height in metres)², rounded to one decimal.
pub fn compute_bmi(height_cm: f64, weight_kg: f64) -> f64 {
    let metres = height_cm / 100.0;
    let raw = weight_kg / (metres * metres);
    (raw * 10.0).round() / 10.0
}

pub fn categorize_bmi(bmi: f64) -> BmiCategory {
    if bmi < 18.5 {
        BmiCategory::Underweight
    } else if bmi < 25.0 {
        BmiCategory::Normal
    } else if bmi < 30.0 {
        BmiCategory::Overweight
    } else {
        BmiCategory::Obese
    }
}

/// Valid profile for tests in other modules (170 cm / 70 kg, BMI 24.2).
#[cfg(test)]
pub(crate) fn test_profile() -> Profile {
    Profile::from_form(ProfileForm {
        name: "Ana Lima".into(),
        age: 34,
        gender: Gender::Female,
        height_cm: 170.0,
        weight_kg: 70.0,
        allergies: "penicillin".into(),
        ..ProfileForm::default()
    })
    .unwrap()
}
