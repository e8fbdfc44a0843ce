// Registry — Build a layer from its configuration record
//
// The set of layer types is closed: every `LayerKind` variant maps to one
// concrete layer. Construction never fails; parameter validation happens in
// the layer's own setup, where bottom shapes are known.

use lamina_core::dtype::WithDType;

use crate::config::{LayerConfig, LayerKind};
use crate::expand::ExpandLayer;
use crate::layer::Layer;
use crate::loss::SigmoidCrossEntropyLossLayer;
use crate::reshape::ReshapeLayer;
use crate::sigmoid::SigmoidLayer;

/// Every registered layer type name.
pub const LAYER_TYPES: [&str; 4] = ["Expand", "Reshape", "Sigmoid", "SigmoidCrossEntropyLoss"];

/// Instantiate the layer described by `config`.
pub fn create_layer<T: WithDType>(config: &LayerConfig) -> Box<dyn Layer<T>> {
    log::debug!("creating layer {} ({})", config.name, config.kind.type_name());
    match &config.kind {
        LayerKind::Expand { expand_param } => Box::new(ExpandLayer::new(expand_param.clone())),
        LayerKind::Reshape { reshape_param } => Box::new(ReshapeLayer::new(*reshape_param)),
        LayerKind::Sigmoid => Box::new(SigmoidLayer::new()),
        LayerKind::SigmoidCrossEntropyLoss { loss_param } => {
            Box::new(SigmoidCrossEntropyLossLayer::<T>::new(loss_param.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExpandParameter, LossParameter, ReshapeParameter};

    #[test]
    fn test_type_names_round_trip() {
        let kinds = [
            LayerKind::Expand {
                expand_param: ExpandParameter::square(2),
            },
            LayerKind::Reshape {
                reshape_param: ReshapeParameter::new(1, 1, 0),
            },
            LayerKind::Sigmoid,
            LayerKind::SigmoidCrossEntropyLoss {
                loss_param: LossParameter::default(),
            },
        ];
        for (kind, name) in kinds.into_iter().zip(LAYER_TYPES) {
            let layer = create_layer::<f32>(&LayerConfig::new("l", kind));
            assert_eq!(layer.layer_type(), name);
        }
    }

    #[test]
    fn test_arity() {
        let loss = create_layer::<f64>(&LayerConfig::new(
            "loss",
            LayerKind::SigmoidCrossEntropyLoss {
                loss_param: LossParameter::default(),
            },
        ));
        assert_eq!(loss.exact_num_bottom_blobs(), 2);
        assert_eq!(loss.exact_num_top_blobs(), 1);
        assert!(loss.is_loss());

        let reshape = create_layer::<f64>(&LayerConfig::new(
            "r",
            LayerKind::Reshape {
                reshape_param: ReshapeParameter::new(1, 1, 0),
            },
        ));
        assert_eq!(reshape.exact_num_bottom_blobs(), 1);
        assert!(!reshape.is_loss());
    }
}
