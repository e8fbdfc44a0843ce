// Net — Drive a list of layers over named blobs
//
// A Net owns every blob. Layers are wired by blob name: each layer's bottoms
// must already exist (a net input or an earlier layer's top) and each top
// names a new blob.
//
// CALL SEQUENCE:
//
//   from_config  — create layers, create blobs, run every layer's setup
//   forward      — for each layer in order: reshape, then forward
//   backward     — for each layer in reverse: backward, with per-bottom
//                  propagate_down flags fixed at construction
//
// WHO GETS GRADIENTS:
//
//   Net inputs need a gradient only with `force_backward`. A layer needs
//   backward when any of its bottoms does; its tops then need one as well.
//   A bottom is flagged only if the layer allows it (a loss layer never
//   allows its label input).
//
// FAN-OUT:
//
//   Every layer assigns its bottom diffs rather than adding to them, so a
//   blob may be the bottom of at most one layer. A second reader is a
//   configuration error.
//
// BORROWING:
//
//   A layer call needs shared access to some blobs and exclusive access to
//   others. The exclusive ones are moved out of the blob table for the call
//   and moved back afterwards, so no blob can be both bottom and top of
//   the same layer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use lamina_core::dtype::WithDType;
use lamina_core::error::{Error, Result};
use lamina_core::{Blob, BlobShape};
use lamina_nn::config::LayerConfig;
use lamina_nn::layer::Layer;
use lamina_nn::registry::create_layer;

/// A named network input and its initial shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    pub name: String,
    pub shape: [usize; 4],
}

/// A complete network description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    /// Compute gradients for net inputs too.
    #[serde(default)]
    pub force_backward: bool,
    pub layers: Vec<LayerConfig>,
}

impl NetConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(format!("net config: {e}")))
    }
}

/// A sequence of layers and the blobs connecting them.
pub struct Net<T: WithDType = f32> {
    name: String,
    layers: Vec<Box<dyn Layer<T>>>,
    layer_names: Vec<String>,
    bottom_ids: Vec<Vec<usize>>,
    top_ids: Vec<Vec<usize>>,
    propagate_down: Vec<Vec<bool>>,
    layer_needs_backward: Vec<bool>,
    /// Loss weight of top 0, for loss layers.
    loss_weights: Vec<Option<T>>,
    blobs: Vec<Blob<T>>,
    blob_names: Vec<String>,
    blob_index: HashMap<String, usize>,
    input_ids: Vec<usize>,
}

/// Move the blobs at `ids` out of `blobs`, leaving empty blobs behind.
fn take_blobs<T: WithDType>(blobs: &mut [Blob<T>], ids: &[usize]) -> Vec<Blob<T>> {
    ids.iter().map(|&i| std::mem::take(&mut blobs[i])).collect()
}

/// Put blobs taken with [`take_blobs`] back in place.
fn restore_blobs<T: WithDType>(blobs: &mut [Blob<T>], ids: &[usize], taken: Vec<Blob<T>>) {
    for (&i, blob) in ids.iter().zip(taken) {
        blobs[i] = blob;
    }
}

impl<T: WithDType> Net<T> {
    /// Build every layer, create its tops and run its setup.
    pub fn from_config(config: &NetConfig) -> Result<Self> {
        let mut net = Net {
            name: config.name.clone(),
            layers: Vec::with_capacity(config.layers.len()),
            layer_names: Vec::with_capacity(config.layers.len()),
            bottom_ids: Vec::new(),
            top_ids: Vec::new(),
            propagate_down: Vec::new(),
            layer_needs_backward: Vec::new(),
            loss_weights: Vec::new(),
            blobs: Vec::new(),
            blob_names: Vec::new(),
            blob_index: HashMap::new(),
            input_ids: Vec::new(),
        };
        log::info!("Initializing net {}", net.name);

        let mut blob_needs_backward = Vec::new();
        for input in &config.inputs {
            let id = net.add_blob(&input.name, Blob::new(input.shape))?;
            net.input_ids.push(id);
            blob_needs_backward.push(config.force_backward);
            log::info!("Input {} shape {}", input.name, BlobShape::from(input.shape));
        }

        for layer_config in &config.layers {
            net.append_layer(layer_config, &mut blob_needs_backward)?;
        }
        log::info!("Net {} initialized with {} layers", net.name, net.layers.len());
        Ok(net)
    }

    /// Parse a JSON description and build the net.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_config(&NetConfig::from_json_str(json)?)
    }

    fn add_blob(&mut self, name: &str, blob: Blob<T>) -> Result<usize> {
        if self.blob_index.contains_key(name) {
            return Err(Error::Config(format!(
                "blob `{name}` is produced twice; in-place layers are not supported"
            )));
        }
        let id = self.blobs.len();
        self.blobs.push(blob);
        self.blob_names.push(name.to_string());
        self.blob_index.insert(name.to_string(), id);
        Ok(id)
    }

    fn append_layer(
        &mut self,
        config: &LayerConfig,
        blob_needs_backward: &mut Vec<bool>,
    ) -> Result<()> {
        log::info!("Creating layer {}", config.name);
        let mut layer = create_layer::<T>(config);

        let mut bottom_ids = Vec::with_capacity(config.bottom.len());
        for name in &config.bottom {
            let id = self.blob_id(name)?;
            if bottom_ids.contains(&id) {
                return Err(Error::Config(format!(
                    "layer {} lists bottom `{name}` more than once",
                    config.name
                )));
            }
            if let Some(consumer) = self.consumer_of(id) {
                return Err(Error::Config(format!(
                    "layer {} reads `{name}`, which layer {consumer} already reads; \
                     a blob feeds at most one layer",
                    config.name
                )));
            }
            bottom_ids.push(id);
        }
        let mut top_ids = Vec::with_capacity(config.top.len());
        for name in &config.top {
            top_ids.push(self.add_blob(name, Blob::default())?);
            blob_needs_backward.push(false);
        }

        let mut tops = take_blobs(&mut self.blobs, &top_ids);
        let bottoms: Vec<&Blob<T>> = bottom_ids.iter().map(|&i| &self.blobs[i]).collect();
        let result = layer.setup(&bottoms, &mut tops);
        restore_blobs(&mut self.blobs, &top_ids, tops);
        result?;

        for &id in &top_ids {
            log::info!("Top shape: {} {}", self.blob_names[id], self.blobs[id].shape());
        }

        let loss_weight = match (layer.is_loss(), config.loss_weight) {
            (true, weight) => Some(T::from_f64(weight.unwrap_or(1.0))),
            (false, None) => None,
            (false, Some(_)) => {
                return Err(Error::invalid_config(
                    layer.layer_type(),
                    "loss_weight is only supported on loss layers",
                ))
            }
        };
        if let Some(weight) = loss_weight {
            // The loss weight is the upstream gradient of the scalar loss.
            self.blobs[top_ids[0]].fill_diff(weight)?;
            log::info!("    with loss weight {}", weight);
        }

        let propagate_down: Vec<bool> = bottom_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| blob_needs_backward[id] && layer.allow_force_backward(i))
            .collect();
        let needs_backward = propagate_down.iter().any(|&p| p);
        for &id in &top_ids {
            blob_needs_backward[id] = needs_backward;
        }
        if needs_backward {
            log::info!("{} needs backward computation.", config.name);
        } else {
            log::info!("{} does not need backward computation.", config.name);
        }

        self.layers.push(layer);
        self.layer_names.push(config.name.clone());
        self.bottom_ids.push(bottom_ids);
        self.top_ids.push(top_ids);
        self.propagate_down.push(propagate_down);
        self.layer_needs_backward.push(needs_backward);
        self.loss_weights.push(loss_weight);
        Ok(())
    }

    /// Name of the earlier layer that takes blob `id` as a bottom, if any.
    fn consumer_of(&self, id: usize) -> Option<&str> {
        self.bottom_ids
            .iter()
            .position(|ids| ids.contains(&id))
            .map(|i| self.layer_names[i].as_str())
    }

    fn blob_id(&self, name: &str) -> Result<usize> {
        self.blob_index
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownBlob(name.to_string()))
    }

    /// Re-run shape inference for every layer, e.g. after an input was reshaped.
    pub fn reshape(&mut self) -> Result<()> {
        for i in 0..self.layers.len() {
            let mut tops = take_blobs(&mut self.blobs, &self.top_ids[i]);
            let bottoms: Vec<&Blob<T>> =
                self.bottom_ids[i].iter().map(|&b| &self.blobs[b]).collect();
            let result = self.layers[i].reshape(&bottoms, &mut tops);
            restore_blobs(&mut self.blobs, &self.top_ids[i], tops);
            result?;
        }
        Ok(())
    }

    /// Run every layer forward and return the weighted sum of all losses.
    pub fn forward(&mut self) -> Result<T> {
        let mut loss = T::zero();
        for i in 0..self.layers.len() {
            let mut tops = take_blobs(&mut self.blobs, &self.top_ids[i]);
            let bottoms: Vec<&Blob<T>> =
                self.bottom_ids[i].iter().map(|&b| &self.blobs[b]).collect();
            let layer = &mut self.layers[i];
            let result = layer
                .reshape(&bottoms, &mut tops)
                .and_then(|_| layer.forward(&bottoms, &mut tops));
            restore_blobs(&mut self.blobs, &self.top_ids[i], tops);
            result?;

            if let Some(weight) = self.loss_weights[i] {
                let value = self.blobs[self.top_ids[i][0]].data()?[0];
                log::debug!("{}: loss {}", self.layer_names[i], value);
                loss = loss + weight * value;
            }
        }
        Ok(loss)
    }

    /// Run backward through every layer that needs it, last layer first.
    pub fn backward(&mut self) -> Result<()> {
        for i in (0..self.layers.len()).rev() {
            if !self.layer_needs_backward[i] {
                continue;
            }
            let mut bottoms = take_blobs(&mut self.blobs, &self.bottom_ids[i]);
            let tops: Vec<&Blob<T>> = self.top_ids[i].iter().map(|&t| &self.blobs[t]).collect();
            let result = self.layers[i].backward(&tops, &self.propagate_down[i], &mut bottoms);
            restore_blobs(&mut self.blobs, &self.bottom_ids[i], bottoms);
            result?;
        }
        Ok(())
    }

    /// `forward` followed by `backward`; returns the loss.
    pub fn forward_backward(&mut self) -> Result<T> {
        let loss = self.forward()?;
        self.backward()?;
        Ok(loss)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layer_names(&self) -> &[String] {
        &self.layer_names
    }

    pub fn blob_names(&self) -> &[String] {
        &self.blob_names
    }

    /// Names of the net inputs, in declaration order.
    pub fn input_names(&self) -> Vec<&str> {
        self.input_ids
            .iter()
            .map(|&i| self.blob_names[i].as_str())
            .collect()
    }

    pub fn has_blob(&self, name: &str) -> bool {
        self.blob_index.contains_key(name)
    }

    pub fn blob(&self, name: &str) -> Result<&Blob<T>> {
        Ok(&self.blobs[self.blob_id(name)?])
    }

    /// Mutable access, e.g. to reshape an input before calling [`Net::reshape`].
    pub fn blob_mut(&mut self, name: &str) -> Result<&mut Blob<T>> {
        let id = self.blob_id(name)?;
        Ok(&mut self.blobs[id])
    }

    /// `propagate_down` flags of the named layer.
    pub fn propagate_down(&self, layer_name: &str) -> Option<&[bool]> {
        self.layer_names
            .iter()
            .position(|n| n == layer_name)
            .map(|i| self.propagate_down[i].as_slice())
    }
}
