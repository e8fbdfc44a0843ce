// Layer configuration — The parameter records layers are built from
//
// A network description is JSON: a list of layers, each with a name, a
// "type" tag, bottom/top blob names, an optional loss weight, and the
// parameter block for its type:
//
//   {
//     "name": "expand1",
//     "type": "Expand",
//     "bottom": ["feat"],
//     "top": ["grid"],
//     "expand_param": { "expand_h": 4, "expand_w": 6 }
//   }
//
// Records are plain data. Validation (mutually exclusive fields, positive
// sizes) belongs to each layer's setup, so a bad record still parses and
// fails at the point the layer would have been built.

use serde::{Deserialize, Serialize};

use lamina_core::error::{Error, Result};

/// Parameters of the `Expand` layer.
///
/// Exactly one sizing style must be used: `expand_size` for a square grid,
/// or both `expand_h` and `expand_w`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExpandParameter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand_h: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand_w: Option<usize>,
}

impl ExpandParameter {
    /// Square `size × size` expansion.
    pub fn square(size: usize) -> Self {
        ExpandParameter {
            expand_size: Some(size),
            ..Default::default()
        }
    }

    /// `height × width` expansion.
    pub fn hw(height: usize, width: usize) -> Self {
        ExpandParameter {
            expand_h: Some(height),
            expand_w: Some(width),
            ..Default::default()
        }
    }
}

/// Parameters of the `Reshape` layer. Zero means "infer this axis".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReshapeParameter {
    pub channel: usize,
    pub height: usize,
    pub width: usize,
}

impl ReshapeParameter {
    pub fn new(channel: usize, height: usize, width: usize) -> Self {
        ReshapeParameter {
            channel,
            height,
            width,
        }
    }
}

/// Parameters shared by loss layers.
///
/// `class_weight` is `[positive, negative]`; with fewer than two entries
/// both classes weigh 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LossParameter {
    pub class_weight: Vec<f64>,
}

impl LossParameter {
    pub fn with_class_weight(positive: f64, negative: f64) -> Self {
        LossParameter {
            class_weight: vec![positive, negative],
        }
    }
}

/// The layer type together with its parameter block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LayerKind {
    Expand {
        #[serde(default)]
        expand_param: ExpandParameter,
    },
    Reshape {
        #[serde(default)]
        reshape_param: ReshapeParameter,
    },
    Sigmoid,
    SigmoidCrossEntropyLoss {
        #[serde(default)]
        loss_param: LossParameter,
    },
}

impl LayerKind {
    /// The registered type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            LayerKind::Expand { .. } => "Expand",
            LayerKind::Reshape { .. } => "Reshape",
            LayerKind::Sigmoid => "Sigmoid",
            LayerKind::SigmoidCrossEntropyLoss { .. } => "SigmoidCrossEntropyLoss",
        }
    }
}

/// One layer of a network description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    #[serde(flatten)]
    pub kind: LayerKind,
    #[serde(default)]
    pub bottom: Vec<String>,
    #[serde(default)]
    pub top: Vec<String>,
    /// Scale applied to this layer's top 0 when summing the network loss.
    /// Unset means 1.0 for loss layers and 0.0 otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss_weight: Option<f64>,
}

impl LayerConfig {
    pub fn new(name: impl Into<String>, kind: LayerKind) -> Self {
        LayerConfig {
            name: name.into(),
            kind,
            bottom: Vec::new(),
            top: Vec::new(),
            loss_weight: None,
        }
    }

    /// Append a bottom blob name. Returns self for chaining.
    pub fn bottom(mut self, name: impl Into<String>) -> Self {
        self.bottom.push(name.into());
        self
    }

    /// Append a top blob name. Returns self for chaining.
    pub fn top(mut self, name: impl Into<String>) -> Self {
        self.top.push(name.into());
        self
    }

    pub fn with_loss_weight(mut self, weight: f64) -> Self {
        self.loss_weight = Some(weight);
        self
    }

    /// Parse a single layer record from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(format!("layer config: {e}")))
    }
}
