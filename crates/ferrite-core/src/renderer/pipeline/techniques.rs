// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The technique registry.
//!
//! A technique pairs a pipeline state object with the root signature it expects.
//! Both are addressed through stable integer ids handed out at registration, so
//! the registry can rebuild every pipeline in place (hot shader reload) without
//! invalidating anything that refers to a technique by id.

use super::root_signature::{RootSignature, RootSignatureId};
use crate::renderer::api::*;
use crate::renderer::error::{ShaderError, TechniqueError};
use crate::renderer::traits::{RenderDevice, ShaderBytecode, ShaderProvider};
use std::fmt;
use std::sync::Arc;

/// The stable identity of a registered technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TechniqueId(pub u32);

/// The declaration of a technique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechniqueDesc {
    /// A unique, human readable name.
    pub label: String,
    /// The root signature the pipeline is built against.
    pub root_signature: RootSignatureId,
    /// The shaders and fixed-function state.
    pub pipeline: PipelineDesc,
    /// Whether the technique writes a color attachment. Depth-only passes set
    /// this to `false`.
    pub writes_color: bool,
}

/// A registered technique.
#[derive(Debug, Clone)]
pub struct Technique {
    id: TechniqueId,
    desc: TechniqueDesc,
    pipeline: NativePipelineId,
    generation: u32,
}

impl Technique {
    /// The stable id.
    pub fn id(&self) -> TechniqueId {
        self.id
    }

    /// The name of the technique.
    pub fn label(&self) -> &str {
        &self.desc.label
    }

    /// The declaration the technique was registered with.
    pub fn desc(&self) -> &TechniqueDesc {
        &self.desc
    }

    /// The root signature the pipeline expects.
    pub fn root_signature(&self) -> RootSignatureId {
        self.desc.root_signature
    }

    /// The current native pipeline object. Changes on every rebuild.
    pub fn pipeline(&self) -> NativePipelineId {
        self.pipeline
    }

    /// Whether the technique writes a color attachment.
    pub fn writes_color(&self) -> bool {
        self.desc.writes_color
    }

    /// Whether root arguments of this technique target the graphics or compute root.
    pub fn bind_point(&self) -> PipelineBindPoint {
        if self.desc.pipeline.is_compute() {
            PipelineBindPoint::Compute
        } else {
            PipelineBindPoint::Graphics
        }
    }

    /// How many times the pipeline has been rebuilt.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// A fixed set of root signatures and techniques, declared up front.
///
/// Ids are assigned in declaration order and match the ids the registry hands
/// out when the catalog is loaded through [`Techniques::on_init`].
#[derive(Debug, Clone, Default)]
pub struct TechniqueCatalog {
    root_signatures: Vec<RootSignatureDesc<'static>>,
    techniques: Vec<TechniqueDesc>,
}

impl TechniqueCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a root signature.
    pub fn add_root_signature(&mut self, desc: RootSignatureDesc<'static>) -> RootSignatureId {
        self.root_signatures.push(desc);
        RootSignatureId(self.root_signatures.len() as u32 - 1)
    }

    /// Declares a technique.
    pub fn add_technique(&mut self, desc: TechniqueDesc) -> TechniqueId {
        self.techniques.push(desc);
        TechniqueId(self.techniques.len() as u32 - 1)
    }

    /// The declared root signatures, in id order.
    pub fn root_signatures(&self) -> &[RootSignatureDesc<'static>] {
        &self.root_signatures
    }

    /// The declared techniques, in id order.
    pub fn techniques(&self) -> &[TechniqueDesc] {
        &self.techniques
    }
}

/// The registry of root signatures and techniques.
pub struct Techniques {
    device: Arc<dyn RenderDevice>,
    shaders: Arc<dyn ShaderProvider>,
    root_signatures: Vec<RootSignature>,
    techniques: Vec<Technique>,
}

impl Techniques {
    /// Creates an empty registry.
    pub fn new(device: Arc<dyn RenderDevice>, shaders: Arc<dyn ShaderProvider>) -> Self {
        Self {
            device,
            shaders,
            root_signatures: Vec::new(),
            techniques: Vec::new(),
        }
    }

    /// Replaces the registry content with `catalog`.
    ///
    /// Any failure is fatal for the catalog: the registry is left empty.
    pub fn on_init(&mut self, catalog: &TechniqueCatalog) -> Result<(), TechniqueError> {
        self.clear();

        if let Err(err) = self.register_catalog(catalog) {
            log::error!("Technique catalog initialisation failed: {err}");
            self.clear();
            return Err(err);
        }

        log::info!(
            "Technique catalog built: {} root signature(s), {} technique(s)",
            self.root_signatures.len(),
            self.techniques.len()
        );
        Ok(())
    }

    fn register_catalog(&mut self, catalog: &TechniqueCatalog) -> Result<(), TechniqueError> {
        for desc in catalog.root_signatures() {
            self.register_root_signature(desc.clone())?;
        }
        for desc in catalog.techniques() {
            self.register_technique(desc.clone())?;
        }
        Ok(())
    }

    /// Creates and registers a root signature.
    pub fn register_root_signature(
        &mut self,
        desc: RootSignatureDesc<'static>,
    ) -> Result<RootSignatureId, TechniqueError> {
        let id = RootSignatureId(self.root_signatures.len() as u32);
        let root_signature = RootSignature::new(&self.device, id, desc)?;
        log::debug!("Registered root signature '{}' as {id:?}", root_signature.label());
        self.root_signatures.push(root_signature);
        Ok(id)
    }

    /// Loads the shaders of a technique, builds its pipeline and registers it.
    pub fn register_technique(&mut self, desc: TechniqueDesc) -> Result<TechniqueId, TechniqueError> {
        let pipeline = self.build_pipeline(&desc)?;
        let id = TechniqueId(self.techniques.len() as u32);
        log::debug!("Registered technique '{}' as {id:?}", desc.label);
        self.techniques.push(Technique {
            id,
            desc,
            pipeline,
            generation: 0,
        });
        Ok(id)
    }

    fn load_shader(
        &self,
        technique: &str,
        shader: &ShaderRef,
        stage: ShaderStage,
    ) -> Result<ShaderBytecode, TechniqueError> {
        self.shaders
            .load(&shader.name, &shader.entry_point, stage)
            .and_then(|bytecode| {
                if bytecode.is_empty() {
                    Err(ShaderError::EmptyBytecode {
                        name: shader.name.clone(),
                    })
                } else {
                    Ok(bytecode)
                }
            })
            .map_err(|source| TechniqueError::Shader {
                technique: technique.to_string(),
                source,
            })
    }

    fn build_pipeline(&self, desc: &TechniqueDesc) -> Result<NativePipelineId, TechniqueError> {
        let root_signature = self.root_signature(desc.root_signature)?.native();
        let pipeline = match &desc.pipeline {
            PipelineDesc::Graphics(state) => {
                let vertex = self.load_shader(&desc.label, &state.vertex, ShaderStage::Vertex)?;
                let pixel = state
                    .pixel
                    .as_ref()
                    .map(|pixel| self.load_shader(&desc.label, pixel, ShaderStage::Pixel))
                    .transpose()?;
                self.device
                    .create_graphics_pipeline(&NativeGraphicsPipelineDesc {
                        label: &desc.label,
                        root_signature,
                        vertex: &vertex,
                        pixel: pixel.as_ref(),
                        state,
                    })?
            }
            PipelineDesc::Compute(state) => {
                let shader = self.load_shader(&desc.label, &state.shader, ShaderStage::Compute)?;
                self.device
                    .create_compute_pipeline(&NativeComputePipelineDesc {
                        label: &desc.label,
                        root_signature,
                        shader: &shader,
                    })?
            }
        };
        Ok(pipeline)
    }

    /// Reloads every shader and recreates every technique's pipeline in place.
    ///
    /// Ids and root signature associations are preserved; every technique gets a
    /// new pipeline object. The caller must make sure no GPU work still references
    /// the old pipelines, which means flushing every queue first.
    ///
    /// The rebuild is all-or-nothing: if any technique fails to build, the
    /// pipelines built so far are released and the registry keeps the old ones.
    pub fn rebuild_shaders(&mut self) -> Result<(), TechniqueError> {
        log::info!("Rebuilding {} technique(s)", self.techniques.len());
        self.shaders.reset_cache();

        let mut rebuilt = Vec::with_capacity(self.techniques.len());
        for technique in &self.techniques {
            match self.build_pipeline(&technique.desc) {
                Ok(pipeline) => rebuilt.push(pipeline),
                Err(err) => {
                    log::error!(
                        "Rebuild of technique '{}' failed, keeping the previous pipelines: {err}",
                        technique.label()
                    );
                    for pipeline in rebuilt {
                        self.device.destroy_pipeline(pipeline);
                    }
                    return Err(err);
                }
            }
        }

        for (technique, pipeline) in self.techniques.iter_mut().zip(rebuilt) {
            self.device.destroy_pipeline(technique.pipeline);
            technique.pipeline = pipeline;
            technique.generation += 1;
        }
        Ok(())
    }

    /// Looks a technique up by id.
    pub fn technique(&self, id: TechniqueId) -> Result<&Technique, TechniqueError> {
        self.techniques
            .get(id.0 as usize)
            .ok_or(TechniqueError::UnknownTechnique(id))
    }

    /// Looks a root signature up by id.
    pub fn root_signature(&self, id: RootSignatureId) -> Result<&RootSignature, TechniqueError> {
        self.root_signatures
            .get(id.0 as usize)
            .ok_or(TechniqueError::UnknownRootSignature(id))
    }

    /// Looks a technique up by id together with its root signature.
    pub fn technique_with_root(
        &self,
        id: TechniqueId,
    ) -> Result<(&Technique, &RootSignature), TechniqueError> {
        let technique = self.technique(id)?;
        let root_signature = self.root_signature(technique.root_signature())?;
        Ok((technique, root_signature))
    }

    /// Returns whether a technique writes a color attachment.
    pub fn tech_has_color(&self, id: TechniqueId) -> Result<bool, TechniqueError> {
        self.technique(id).map(Technique::writes_color)
    }

    /// Finds a technique by label.
    pub fn find(&self, label: &str) -> Option<TechniqueId> {
        self.techniques
            .iter()
            .find(|technique| technique.label() == label)
            .map(Technique::id)
    }

    /// Iterates over the registered techniques in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Technique> {
        self.techniques.iter()
    }

    /// The number of registered techniques.
    pub fn len(&self) -> usize {
        self.techniques.len()
    }

    /// Returns `true` if no technique is registered.
    pub fn is_empty(&self) -> bool {
        self.techniques.is_empty()
    }

    /// The number of registered root signatures.
    pub fn root_signature_count(&self) -> usize {
        self.root_signatures.len()
    }

    fn clear(&mut self) {
        for technique in self.techniques.drain(..) {
            self.device.destroy_pipeline(technique.pipeline);
        }
        self.root_signatures.clear();
    }
}

impl fmt::Debug for Techniques {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Techniques")
            .field("root_signatures", &self.root_signatures)
            .field("techniques", &self.techniques)
            .finish()
    }
}

impl Drop for Techniques {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDevice, MockShaderProvider};
    use std::borrow::Cow;

    fn scene_root_signature() -> RootSignatureDesc<'static> {
        RootSignatureDesc {
            label: Some(Cow::Borrowed("Scene")),
            parameters: vec![
                RootParameter::cbv(0),
                RootParameter::table([DescriptorRange::new(DescriptorRangeType::Srv, 4, 0)]),
            ],
            ..Default::default()
        }
    }

    fn catalog() -> TechniqueCatalog {
        let mut catalog = TechniqueCatalog::new();
        let scene = catalog.add_root_signature(scene_root_signature());
        catalog.add_technique(TechniqueDesc {
            label: "DepthOnly".to_string(),
            root_signature: scene,
            pipeline: PipelineDesc::Graphics(GraphicsPipelineDesc::new(
                ShaderRef::new("scene", "VSMain"),
                None,
            )),
            writes_color: false,
        });
        catalog.add_technique(TechniqueDesc {
            label: "Forward".to_string(),
            root_signature: scene,
            pipeline: PipelineDesc::Graphics(GraphicsPipelineDesc::new(
                ShaderRef::new("scene", "VSMain"),
                Some(ShaderRef::new("scene", "PSMain")),
            )),
            writes_color: true,
        });
        catalog.add_technique(TechniqueDesc {
            label: "Cull".to_string(),
            root_signature: scene,
            pipeline: PipelineDesc::Compute(ComputePipelineDesc {
                shader: ShaderRef::new("cull", "CSMain"),
            }),
            writes_color: false,
        });
        catalog
    }

    fn registry() -> (Arc<MockDevice>, Arc<MockShaderProvider>, Techniques) {
        let (mock, device) = MockDevice::shared();
        let shaders = Arc::new(MockShaderProvider::default());
        let mut techniques = Techniques::new(device, shaders.clone());
        techniques.on_init(&catalog()).expect("catalog builds");
        (mock, shaders, techniques)
    }

    #[test]
    fn on_init_assigns_catalog_ids() {
        let (_, _, techniques) = registry();
        assert_eq!(techniques.len(), 3);
        assert_eq!(techniques.root_signature_count(), 1);
        assert_eq!(techniques.find("Forward"), Some(TechniqueId(1)));

        let (cull, root) = techniques
            .technique_with_root(TechniqueId(2))
            .expect("technique exists");
        assert_eq!(cull.bind_point(), PipelineBindPoint::Compute);
        assert_eq!(root.id(), RootSignatureId(0));
    }

    #[test]
    fn rebuild_replaces_pipelines_and_keeps_ids() {
        let (mock, shaders, mut techniques) = registry();
        let before: Vec<_> = techniques.iter().cloned().collect();

        techniques.rebuild_shaders().expect("rebuild succeeds");

        assert_eq!(shaders.resets(), 1);
        for old in &before {
            let new = techniques.technique(old.id()).expect("id is preserved");
            assert_ne!(new.pipeline(), old.pipeline());
            assert_eq!(new.root_signature(), old.root_signature());
            assert_eq!(new.generation(), 1);
            assert!(mock.calls().destroyed_pipelines.contains(&old.pipeline()));
        }
    }

    #[test]
    fn failed_rebuild_keeps_previous_pipelines() {
        let (mock, shaders, mut techniques) = registry();
        let before: Vec<_> = techniques.iter().map(Technique::pipeline).collect();

        shaders.remove("scene", "PSMain");
        let err = techniques.rebuild_shaders().expect_err("pixel shader is missing");
        assert!(matches!(err, TechniqueError::Shader { ref technique, .. } if technique == "Forward"));

        let after: Vec<_> = techniques.iter().map(Technique::pipeline).collect();
        assert_eq!(before, after);
        // Only the DepthOnly pipeline had been rebuilt; it is released again.
        let destroyed = mock.calls().destroyed_pipelines.clone();
        assert_eq!(destroyed.len(), 1);
        assert!(!before.contains(&destroyed[0]));
    }

    #[test]
    fn lookups_are_checked() {
        let (_, _, techniques) = registry();
        assert!(matches!(
            techniques.technique(TechniqueId(42)),
            Err(TechniqueError::UnknownTechnique(TechniqueId(42)))
        ));
        assert!(matches!(
            techniques.root_signature(RootSignatureId(7)),
            Err(TechniqueError::UnknownRootSignature(RootSignatureId(7)))
        ));
        assert!(techniques.tech_has_color(TechniqueId(3)).is_err());
    }

    #[test]
    fn color_classification_is_declared_data() {
        let (_, _, techniques) = registry();
        assert!(!techniques.tech_has_color(TechniqueId(0)).expect("exists"));
        assert!(techniques.tech_has_color(TechniqueId(1)).expect("exists"));
        assert!(!techniques.tech_has_color(TechniqueId(2)).expect("exists"));
    }

    #[test]
    fn missing_root_signature_is_rejected_at_registration() {
        let (_, _, mut techniques) = registry();
        let err = techniques
            .register_technique(TechniqueDesc {
                label: "Orphan".to_string(),
                root_signature: RootSignatureId(9),
                pipeline: PipelineDesc::Compute(ComputePipelineDesc {
                    shader: ShaderRef::new("cull", "CSMain"),
                }),
                writes_color: false,
            })
            .expect_err("root signature 9 does not exist");
        assert!(matches!(err, TechniqueError::UnknownRootSignature(_)));
        assert_eq!(techniques.len(), 3);
    }

    #[test]
    fn failing_catalog_leaves_the_registry_empty() {
        let (_, device) = MockDevice::shared();
        let shaders = Arc::new(MockShaderProvider::default());
        shaders.insert("cull", "CSMain", Vec::new());
        let mut techniques = Techniques::new(device, shaders);

        let err = techniques.on_init(&catalog()).expect_err("empty byte code");
        assert!(matches!(
            err,
            TechniqueError::Shader {
                source: ShaderError::EmptyBytecode { .. },
                ..
            }
        ));
        assert!(techniques.is_empty());
        assert_eq!(techniques.root_signature_count(), 0);
    }
}
