use serde::{Deserialize, Serialize};

/// The fixed menu of attribute names the intake forms offer. Anything else
/// goes through the `Other` selection and becomes a custom-named row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredefinedAttribute {
    Color,
    Size,
    Style,
    Material,
    Edition,
}

impl PredefinedAttribute {
    pub const ALL: [PredefinedAttribute; 5] = [
        PredefinedAttribute::Color,
        PredefinedAttribute::Size,
        PredefinedAttribute::Style,
        PredefinedAttribute::Material,
        PredefinedAttribute::Edition,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PredefinedAttribute::Color => "Color",
            PredefinedAttribute::Size => "Size",
            PredefinedAttribute::Style => "Style",
            PredefinedAttribute::Material => "Material",
            PredefinedAttribute::Edition => "Edition",
        }
    }

    pub fn from_label(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "color" => Some(PredefinedAttribute::Color),
            "size" => Some(PredefinedAttribute::Size),
            "style" => Some(PredefinedAttribute::Style),
            "material" => Some(PredefinedAttribute::Material),
            "edition" => Some(PredefinedAttribute::Edition),
            _ => None,
        }
    }
}

/// A row's name is either one of the predefined attributes or the free text
/// typed after picking "Other". Keeping the two apart makes the uniqueness
/// rule (one row per predefined name) checkable by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum AttributeName {
    Predefined(PredefinedAttribute),
    Custom(String),
}

impl AttributeName {
    pub fn label(&self) -> String {
        match self {
            AttributeName::Predefined(attr) => attr.label().to_string(),
            AttributeName::Custom(name) => name.clone(),
        }
    }
}

/// What the "add row" control passes in: a predefined name, or the `Other`
/// sentinel for a custom row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSelection {
    Predefined(PredefinedAttribute),
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantAttribute {
    pub name: AttributeName,
    pub value: String,
}

/// Partial update for one row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RowPatch {
    #[serde(default)]
    pub name: Option<AttributeName>,
    #[serde(default)]
    pub value: Option<String>,
}

/// The ordered attribute rows of one item. Row order is insertion order and
/// survives every operation verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantAttributeSet {
    rows: Vec<VariantAttribute>,
}

impl VariantAttributeSet {
    pub fn rows(&self) -> &[VariantAttribute] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Predefined names not yet used by any row; the add-row menu offers
    /// exactly these (plus "Other").
    pub fn available(&self) -> Vec<PredefinedAttribute> {
        PredefinedAttribute::ALL
            .into_iter()
            .filter(|attr| !self.has_predefined(*attr, None))
            .collect()
    }

    /// Appends a row. A predefined name already in the set is refused (the
    /// menu should not have offered it, but the set checks anyway); returns
    /// whether a row was appended.
    pub fn add_row(&mut self, selection: RowSelection) -> bool {
        let name = match selection {
            RowSelection::Predefined(attr) => {
                if self.has_predefined(attr, None) {
                    return false;
                }
                AttributeName::Predefined(attr)
            }
            RowSelection::Other => AttributeName::Custom(String::new()),
        };
        self.rows.push(VariantAttribute {
            name,
            value: String::new(),
        });
        true
    }

    /// Applies a partial update at `index`; returns false when the index is
    /// out of range. A rename that would duplicate another row's predefined
    /// name is skipped, but a value change in the same patch still lands.
    /// Renaming away from a custom name discards the typed text.
    pub fn update_row(&mut self, index: usize, patch: RowPatch) -> bool {
        if index >= self.rows.len() {
            return false;
        }
        if let Some(name) = patch.name {
            let duplicate = matches!(
                &name,
                AttributeName::Predefined(attr) if self.has_predefined(*attr, Some(index))
            );
            if !duplicate {
                self.rows[index].name = name;
            }
        }
        if let Some(value) = patch.value {
            self.rows[index].value = value;
        }
        true
    }

    pub fn remove_row(&mut self, index: usize) -> bool {
        if index >= self.rows.len() {
            return false;
        }
        self.rows.remove(index);
        true
    }

    fn has_predefined(&self, attr: PredefinedAttribute, skip: Option<usize>) -> bool {
        self.rows.iter().enumerate().any(|(pos, row)| {
            Some(pos) != skip && row.name == AttributeName::Predefined(attr)
        })
    }
}
