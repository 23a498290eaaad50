//! Process image: named input and output signals exchanged once per cycle.
//!
//! The scheduler owns one [`InputImage`] and one [`OutputImage`]. At the
//! start of a cycle [`ProcessIo::read_inputs`] refreshes the input image; after
//! the graph ran, [`ProcessIo::write_outputs`] publishes the outputs.

use std::sync::Arc;

use parking_lot::Mutex;

/// Ordered set of named `f64` signals. Indices are stable once inserted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalImage {
    names: Vec<String>,
    values: Vec<f64>,
}

/// Signals read at the start of every cycle.
pub type InputImage = SignalImage;

/// Signals written at the end of every cycle.
pub type OutputImage = SignalImage;

impl SignalImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs. Later duplicates overwrite earlier ones.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut image = Self::new();
        for (name, value) in pairs {
            image.insert(name, value);
        }
        image
    }

    /// Insert or overwrite a signal, returning its index.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) -> usize {
        let name = name.into();
        if let Some(index) = self.index_of(&name) {
            self.values[index] = value;
            return index;
        }
        self.names.push(name);
        self.values.push(value);
        self.values.len() - 1
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.index_of(name).map(|i| self.values[i])
    }

    /// Overwrite an existing signal. Returns `false` for unknown names.
    pub fn set(&mut self, name: &str, value: f64) -> bool {
        match self.index_of(name) {
            Some(i) => {
                self.values[i] = value;
                true
            }
            None => false,
        }
    }

    #[inline]
    pub(crate) fn value(&self, index: usize) -> f64 {
        self.values[index]
    }

    #[inline]
    pub(crate) fn set_value(&mut self, index: usize, value: f64) {
        self.values[index] = value;
    }

    /// Copy values from `other`. Same layout copies by index, otherwise by
    /// name; signals missing from `other` keep their value.
    pub fn copy_values_from(&mut self, other: &SignalImage) {
        if self.names == other.names {
            self.values.copy_from_slice(&other.values);
            return;
        }
        for (name, value) in self.names.iter().zip(self.values.iter_mut()) {
            if let Some(v) = other.get(name) {
                *value = v;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Exchange of the process image with the outside world.
pub trait ProcessIo {
    /// Refresh `image` before the graph runs.
    fn read_inputs(&mut self, image: &mut InputImage);

    /// Publish `image` after the graph ran.
    fn write_outputs(&mut self, image: &OutputImage);
}

/// No external I/O: the input image keeps its configured values.
impl ProcessIo for () {
    fn read_inputs(&mut self, _image: &mut InputImage) {}

    fn write_outputs(&mut self, _image: &OutputImage) {}
}

#[derive(Debug)]
struct Images {
    inputs: InputImage,
    outputs: OutputImage,
}

/// Process image shared between the cycle thread and other collaborators.
///
/// Writers update inputs at any time; the cycle copies them once at the
/// start of each cycle. Inputs wired as output loopbacks are overridden by
/// the graph and should be observed through the output instead.
#[derive(Debug, Clone)]
pub struct SharedProcessImage {
    inner: Arc<Mutex<Images>>,
}

impl SharedProcessImage {
    pub fn new(inputs: InputImage, outputs: OutputImage) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Images { inputs, outputs })),
        }
    }

    /// Set an external input. Returns `false` for unknown names.
    pub fn set_input(&self, name: &str, value: f64) -> bool {
        self.inner.lock().inputs.set(name, value)
    }

    pub fn input(&self, name: &str) -> Option<f64> {
        self.inner.lock().inputs.get(name)
    }

    /// Last published value of an output.
    pub fn output(&self, name: &str) -> Option<f64> {
        self.inner.lock().outputs.get(name)
    }

    /// Copy of all published outputs.
    pub fn outputs(&self) -> OutputImage {
        self.inner.lock().outputs.clone()
    }
}

impl ProcessIo for SharedProcessImage {
    fn read_inputs(&mut self, image: &mut InputImage) {
        image.copy_values_from(&self.inner.lock().inputs);
    }

    fn write_outputs(&mut self, image: &OutputImage) {
        self.inner.lock().outputs.copy_values_from(image);
    }
}
