use crate::data::{DataSpec, DataValue};

/// A typed, named field on a scene node.
///
/// Attribute names are unique per node; adding a duplicate is an error,
/// never a silent overwrite.
#[derive(Clone, Debug)]
pub struct Attribute {
    pub name: String,
    pub spec: DataSpec,
    pub value: DataValue,
    pub default: DataValue,
    /// Shown and keyable in the channel box.
    pub keyable: bool,
    /// Visible in the channel box even when not keyable.
    pub channel_visible: bool,
    pub locked: bool,
    pub min: Option<f32>,
    pub max: Option<f32>,
    /// Value labels, only meaningful for [`DataSpec::Enum`].
    pub enum_names: Vec<String>,
}

impl Attribute {
    pub(crate) fn clamped(&self, value: f32) -> f32 {
        let mut v = value;
        if let Some(min) = self.min {
            v = v.max(min);
        }
        if let Some(max) = self.max {
            v = v.min(max);
        }
        v
    }
}

/// Creation-time description of an attribute.
#[derive(Clone, Debug)]
pub struct AttrDef {
    pub name: String,
    pub spec: DataSpec,
    pub default: DataValue,
    pub keyable: bool,
    pub channel_visible: bool,
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub enum_names: Vec<String>,
}

impl AttrDef {
    pub fn new(name: impl Into<String>, spec: DataSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            default: spec.default_value(),
            keyable: true,
            channel_visible: true,
            min: None,
            max: None,
            enum_names: Vec::new(),
        }
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, DataSpec::F32)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, DataSpec::Bool)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, DataSpec::I32)
    }

    pub fn vector(name: impl Into<String>) -> Self {
        Self::new(name, DataSpec::Vec3)
    }

    pub fn enumeration<S: Into<String>>(
        name: impl Into<String>,
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        let mut def = Self::new(name, DataSpec::Enum);
        def.enum_names = names.into_iter().map(Into::into).collect();
        def
    }

    pub fn default_value(mut self, value: impl Into<DataValue>) -> Self {
        self.default = value.into();
        self
    }

    pub fn range(mut self, min: f32, max: f32) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn min(mut self, min: f32) -> Self {
        self.min = Some(min);
        self
    }

    pub fn keyable(mut self, keyable: bool) -> Self {
        self.keyable = keyable;
        self
    }

    /// Non-keyable but still shown, the way switch and visibility toggles
    /// are usually published.
    pub fn channel_box_only(mut self) -> Self {
        self.keyable = false;
        self.channel_visible = true;
        self
    }

    pub(crate) fn build(self) -> Attribute {
        // Scalar defaults follow the declared spec, so `.default_value(1)`
        // on an enum stores an enum index, not a stray integer.
        let default = match (self.spec, self.default) {
            (DataSpec::Enum, DataValue::I32(i)) => DataValue::Enum(i),
            (DataSpec::I32, DataValue::Enum(i)) => DataValue::I32(i),
            (DataSpec::F32, DataValue::I32(i)) => DataValue::F32(i as f32),
            (_, default) => default,
        };
        Attribute {
            name: self.name,
            spec: self.spec,
            value: default,
            default,
            keyable: self.keyable,
            channel_visible: self.channel_visible,
            locked: false,
            min: self.min,
            max: self.max,
            enum_names: self.enum_names,
        }
    }
}
