/// Processor - one draw or dispatch unit bound to a pipeline and a render target
///
/// Input updates only stage CPU data. Before a frame slot is recorded, the
/// owning target calls `update_graphic_data` for that slot, which uploads the
/// staged containers into the slot's buffers and rewrites the slot's
/// descriptor set when needed. `needs_command_list_refresh` then tells the
/// target whether the commands recorded for the slot are still valid.

use std::sync::Arc;
use bytemuck::Pod;

use crate::context::GraphicsContext;
use crate::data::{BufferKind, DataContainer, DataLayout, PerFrameBuffers};
use crate::error::{Error, Result};
use crate::graphics_device::{
    BufferUsage, CommandList, DescriptorResource, DescriptorSet, DescriptorSetDesc,
    DescriptorWrite, GraphicsDevice, IndexType, PipelineType, Rect2D,
};
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::processor::ProcessorDesc;
use crate::render_graph::{TargetHandle, TextureArena, TextureHandle};
use crate::target::RenderTargetInfo;
use crate::texture::TextureReader;
use crate::{engine_debug, engine_error, engine_trace};

/// Workgroup edge of the compute shaders (local size 16x16x1)
const COMPUTE_GROUP_SIZE: u32 = 16;

fn config_error(message: String) -> Error {
    engine_error!("prism::Processor", "{}", message);
    Error::InvalidConfiguration(message)
}

/// Counts baked into the recorded draw command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DrawCounts {
    elements: u32,
    instances: u32,
}

/// GPU side of an initialized processor, one copy per frame slot
struct ProcessorResources {
    pipeline: Arc<Pipeline>,
    data_buffers: Vec<PerFrameBuffers>,
    instance_buffers: Option<PerFrameBuffers>,
    index_buffers: Option<PerFrameBuffers>,
    uniform_buffers: Vec<PerFrameBuffers>,
    descriptor_sets: Vec<Arc<dyn DescriptorSet>>,
    descriptor_dirty: Vec<bool>,
    command_dirty: Vec<bool>,
    recorded_counts: Vec<Option<DrawCounts>>,
    extent: (u32, u32),
    layers: u32,
}

pub struct Processor {
    name: String,
    pipeline_type: PipelineType,
    target: TargetHandle,
    builder: PipelineBuilder,
    data: Vec<DataContainer>,
    instance_data: Option<DataContainer>,
    indices: Option<DataContainer>,
    uniform_data: Vec<DataContainer>,
    texture_readers: Vec<Vec<TextureReader>>,
    outputs: Vec<TextureHandle>,
    scissor: Option<Rect2D>,
    layer_index_in_shader: bool,
    layers_mask: u8,
    enabled: bool,
    rendering_order: i32,
    resources: Option<ProcessorResources>,
}

impl Processor {
    /// Validate the description and prepare the pipeline request
    ///
    /// No GPU object is created until `initialize`.
    pub(crate) fn new(desc: ProcessorDesc, target: TargetHandle) -> Result<Self> {
        debug_assert!(desc.data.iter().all(|d| matches!(d.layout(), DataLayout::Vertex(_))));
        debug_assert!(desc.instance_data.iter().all(|d| matches!(d.layout(), DataLayout::Vertex(_))));
        debug_assert!(desc.indices.iter().all(|d| d.layout() == DataLayout::Index));
        debug_assert!(desc.uniform_data.iter().all(|d| d.layout() == DataLayout::Uniform));
        debug_assert!(
            desc.indices.is_some() || desc.data.windows(2).all(|w| w[0].row_count() == w[1].row_count()),
            "data containers of '{}' disagree on row count",
            desc.name
        );

        if desc.texture_readers.iter().any(|readers| readers.is_empty()) {
            return Err(config_error(format!("Empty texture reader array on processor: {}", desc.name)));
        }

        let mut builder = PipelineBuilder::new(desc.pipeline_type, &desc.name);
        builder.setup_shader(desc.shader.clone());
        match desc.pipeline_type {
            PipelineType::Graphics => {
                builder.setup_shape_type(desc.shape_type)?;
                builder.setup_blend_functions(desc.blend_functions.clone())?;
                builder.setup_depth_operations(desc.depth_test, desc.depth_write)?;
                builder.setup_cull_face_operation(desc.cull_face)?;
                builder.setup_polygon_mode(desc.polygon_mode)?;
                builder.setup_data(
                    desc.data.iter().filter_map(|d| d.variable_type()).collect(),
                    desc.instance_data.as_ref().and_then(|d| d.variable_type()),
                )?;
                builder.setup_layer_index_data_in_shader(desc.layer_index_in_shader)?;
            }
            PipelineType::Compute => {
                if !desc.data.is_empty() || desc.instance_data.is_some() || desc.indices.is_some() {
                    return Err(config_error(format!(
                        "Vertex data only exist on graphics processor: {}",
                        desc.name
                    )));
                }
                if desc.layer_index_in_shader {
                    return Err(config_error(format!(
                        "Layer index data only exist on graphics processor: {}",
                        desc.name
                    )));
                }
            }
        }
        builder.setup_uniform(
            desc.uniform_data.len() as u32,
            desc.texture_readers.iter().map(|readers| readers.len() as u32).collect(),
            desc.outputs.len() as u32,
        );
        builder.setup_scissor(desc.scissor);

        Ok(Self {
            name: desc.name,
            pipeline_type: desc.pipeline_type,
            target,
            builder,
            data: desc.data,
            instance_data: desc.instance_data,
            indices: desc.indices,
            uniform_data: desc.uniform_data,
            texture_readers: desc.texture_readers,
            outputs: desc.outputs,
            scissor: desc.scissor,
            layer_index_in_shader: desc.layer_index_in_shader,
            layers_mask: desc.layers_mask,
            enabled: true,
            rendering_order: 0,
            resources: None,
        })
    }

    // ===== LIFECYCLE =====

    /// Resolve the pipeline and create the per-slot buffers and descriptor sets
    pub(crate) fn initialize(&mut self, context: &mut GraphicsContext, target: &RenderTargetInfo) -> Result<()> {
        if self.resources.is_some() {
            return Ok(());
        }
        let pipeline = self.builder.build(context, target)?;
        let device = context.device().as_ref();
        let slots = target.slot_count;

        let data_buffers = self
            .data
            .iter()
            .enumerate()
            .map(|(i, data)| {
                let name = format!("{} - data{}", self.name, i);
                PerFrameBuffers::new(device, &name, BufferUsage::Vertex, BufferKind::Static, slots, data.bytes())
            })
            .collect::<Result<Vec<_>>>()?;
        let instance_buffers = self
            .instance_data
            .as_ref()
            .map(|data| {
                let name = format!("{} - instance", self.name);
                PerFrameBuffers::new(device, &name, BufferUsage::Vertex, BufferKind::Static, slots, data.bytes())
            })
            .transpose()?;
        let index_buffers = self
            .indices
            .as_ref()
            .map(|data| {
                let name = format!("{} - indices", self.name);
                PerFrameBuffers::new(device, &name, BufferUsage::Index, BufferKind::Static, slots, data.bytes())
            })
            .transpose()?;
        let uniform_buffers = self
            .uniform_data
            .iter()
            .enumerate()
            .map(|(i, data)| {
                let name = format!("{} - uniform{}", self.name, i);
                PerFrameBuffers::new(device, &name, BufferUsage::Uniform, BufferKind::Dynamic, slots, data.bytes())
            })
            .collect::<Result<Vec<_>>>()?;

        let descriptor_sets = if pipeline.descriptor_bindings().is_empty() {
            Vec::new()
        } else {
            device.create_descriptor_sets(&DescriptorSetDesc {
                name: self.name.clone(),
                pipeline: pipeline.device_pipeline().clone(),
                count: slots as u32,
                uniform_count: (self.uniform_data.len() as u32).max(1),
                sampler_count: (self.texture_readers.iter().map(Vec::len).sum::<usize>() as u32).max(1),
                storage_count: self.outputs.len() as u32,
            })?
        };

        for container in self.containers_mut() {
            container.mark_all_processed();
        }

        engine_debug!(
            "prism::Processor",
            "Initialized processor '{}' on '{}' (pipeline {}, {} slots)",
            self.name, target.name, pipeline.id(), slots
        );
        self.resources = Some(ProcessorResources {
            pipeline,
            data_buffers,
            instance_buffers,
            index_buffers,
            uniform_buffers,
            descriptor_dirty: vec![!descriptor_sets.is_empty(); slots],
            descriptor_sets,
            command_dirty: vec![true; slots],
            recorded_counts: vec![None; slots],
            extent: (target.width, target.height),
            layers: target.layers,
        });
        Ok(())
    }

    /// Release the GPU resources (the cached pipeline stays in the cache)
    ///
    /// The caller waits for the device before releasing resources that may
    /// still be in use.
    pub(crate) fn cleanup(&mut self) {
        if self.resources.take().is_some() {
            engine_debug!("prism::Processor", "Released processor '{}'", self.name);
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.resources.is_some()
    }

    // ===== INPUT UPDATES =====

    /// Replace the rows of one vertex stream
    pub fn update_data<T: Pod>(&mut self, index: usize, rows: &[T]) {
        debug_assert!(index < self.data.len(), "no data container {} on '{}'", index, self.name);
        if let Some(container) = self.data.get_mut(index) {
            container.replace_data(rows);
        }
    }

    pub fn update_instance_data<T: Pod>(&mut self, rows: &[T]) {
        debug_assert!(self.instance_data.is_some(), "no instance data on '{}'", self.name);
        if let Some(container) = self.instance_data.as_mut() {
            container.replace_data(rows);
        }
    }

    pub fn update_indices(&mut self, indices: &[u32]) {
        debug_assert!(self.indices.is_some(), "no indices on '{}'", self.name);
        if let Some(container) = self.indices.as_mut() {
            container.replace_data(indices);
        }
    }

    pub fn update_uniform_data<T: Pod>(&mut self, index: usize, value: &T) {
        debug_assert!(index < self.uniform_data.len(), "no uniform {} on '{}'", index, self.name);
        if let Some(container) = self.uniform_data.get_mut(index) {
            container.replace_data(std::slice::from_ref(value));
        }
    }

    /// Replace a single-texture reader binding
    ///
    /// The texture must be initialized. Every slot's descriptor set of this
    /// processor is rewritten before its next use.
    pub(crate) fn update_uniform_texture_reader(
        &mut self,
        position: usize,
        reader: TextureReader,
        textures: &TextureArena,
    ) -> Result<()> {
        debug_assert!(
            self.texture_readers.get(position).is_some_and(|readers| readers.len() == 1),
            "texture reader {} of '{}' is not a single reader",
            position,
            self.name
        );
        self.update_uniform_texture_reader_array(position, 0, reader, textures)
    }

    /// Replace one element of a texture reader array
    pub(crate) fn update_uniform_texture_reader_array(
        &mut self,
        position: usize,
        index: usize,
        reader: TextureReader,
        textures: &TextureArena,
    ) -> Result<()> {
        let texture = textures
            .get(reader.texture)
            .ok_or_else(|| Error::InvalidResource(format!("Texture reader of '{}' uses a removed texture", self.name)))?;
        if !texture.is_initialized() {
            return Err(config_error(format!(
                "Texture '{}' must be initialized before being bound to processor: {}",
                texture.name(),
                self.name
            )));
        }
        let slot = self
            .texture_readers
            .get_mut(position)
            .and_then(|readers| readers.get_mut(index))
            .ok_or_else(|| {
                config_error(format!("No texture reader {}[{}] on processor: {}", position, index, self.name))
            })?;
        *slot = reader;
        if let Some(resources) = self.resources.as_mut() {
            resources.descriptor_dirty.fill(!resources.descriptor_sets.is_empty());
        }
        Ok(())
    }

    /// Rewrite every slot's descriptor set if it binds `texture`
    ///
    /// Called when a texture keeps its handle but gets a new image.
    pub(crate) fn on_texture_image_replaced(&mut self, texture: TextureHandle) {
        let bound = self.textures_read().any(|handle| handle == texture) || self.outputs.contains(&texture);
        if let (true, Some(resources)) = (bound, self.resources.as_mut()) {
            resources.descriptor_dirty.fill(!resources.descriptor_sets.is_empty());
        }
    }

    /// Move the custom scissor
    ///
    /// Only the rectangle is dynamic: a processor built without a custom
    /// scissor cannot get one afterwards.
    pub fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        if self.scissor.is_none() {
            return Err(config_error(format!("No custom scissor on processor: {}", self.name)));
        }
        self.scissor = Some(scissor);
        self.mark_all_slots_dirty();
        Ok(())
    }

    pub fn set_layers_mask(&mut self, layers_mask: u8) {
        if self.layers_mask != layers_mask {
            self.layers_mask = layers_mask;
            self.mark_all_slots_dirty();
        }
    }

    fn mark_all_slots_dirty(&mut self) {
        if let Some(resources) = self.resources.as_mut() {
            resources.command_dirty.fill(true);
        }
    }

    // ===== FRAME =====

    /// Upload the staged data of one slot and refresh its descriptor set
    pub(crate) fn update_graphic_data(
        &mut self,
        slot: usize,
        context: &mut GraphicsContext,
        textures: &TextureArena,
    ) -> Result<()> {
        let counts = self.draw_counts();
        let Some(resources) = self.resources.as_mut() else {
            return Err(Error::InvalidResource(format!("Processor '{}' is not initialized", self.name)));
        };
        let device = context.device().clone();
        let device = device.as_ref();

        let mut recreated = false;
        for (container, buffers) in self.data.iter_mut().zip(resources.data_buffers.iter_mut()) {
            recreated |= upload(container, buffers, device, slot)?;
        }
        if let (Some(container), Some(buffers)) = (self.instance_data.as_mut(), resources.instance_buffers.as_mut()) {
            recreated |= upload(container, buffers, device, slot)?;
        }
        if let (Some(container), Some(buffers)) = (self.indices.as_mut(), resources.index_buffers.as_mut()) {
            recreated |= upload(container, buffers, device, slot)?;
        }
        for (container, buffers) in self.uniform_data.iter_mut().zip(resources.uniform_buffers.iter_mut()) {
            if upload(container, buffers, device, slot)? {
                resources.descriptor_dirty[slot] = true;
            }
        }
        if recreated || resources.recorded_counts[slot].is_some_and(|recorded| recorded != counts) {
            resources.command_dirty[slot] = true;
        }

        if resources.descriptor_dirty[slot] {
            let writes = descriptor_writes(
                &self.texture_readers,
                &self.outputs,
                &resources.uniform_buffers,
                slot,
                context,
                textures,
            )?;
            resources.descriptor_sets[slot].write(&writes)?;
            engine_trace!("prism::Processor", "Descriptor set {} of '{}' rewritten", slot, self.name);
            resources.descriptor_dirty[slot] = false;
            resources.command_dirty[slot] = true;
        }
        Ok(())
    }

    /// Whether the commands recorded for this slot are stale
    pub fn needs_command_list_refresh(&self, slot: usize) -> bool {
        self.layer_index_in_shader
            || self
                .resources
                .as_ref()
                .is_some_and(|r| r.command_dirty.get(slot).copied().unwrap_or(true))
    }

    /// Whether a target layer is recorded
    ///
    /// Layers past the 8 mask bits are always recorded.
    pub fn covers_layer(&self, layer: u32) -> bool {
        layer >= u8::BITS || self.layers_mask & (1 << layer) != 0
    }

    /// Record the draw (or dispatch) of one slot on one target layer
    ///
    /// # Arguments
    ///
    /// * `command_list` - Command list of the slot, inside the render pass for graphics
    /// * `slot` - Frame slot
    /// * `layer` - Target layer being recorded
    /// * `bound_pipeline_id` - Id of the pipeline currently bound (0 = none)
    ///
    /// Returns the id of the pipeline bound after recording.
    pub(crate) fn update_command_list(
        &self,
        command_list: &mut dyn CommandList,
        slot: usize,
        layer: u32,
        bound_pipeline_id: u32,
    ) -> Result<u32> {
        let Some(resources) = self.resources.as_ref() else {
            return Err(Error::InvalidResource(format!("Processor '{}' is not initialized", self.name)));
        };
        let skip = match self.pipeline_type {
            PipelineType::Graphics => !self.covers_layer(layer),
            PipelineType::Compute => layer != 0,
        };
        if skip {
            return Ok(bound_pipeline_id);
        }

        let pipeline = &resources.pipeline;
        let device_pipeline = pipeline.device_pipeline();
        if pipeline.id() != bound_pipeline_id {
            command_list.bind_pipeline(device_pipeline)?;
        }
        if self.layer_index_in_shader {
            command_list.push_constants(device_pipeline, &(layer as i32).to_le_bytes())?;
        }
        if let Some(descriptor_set) = resources.descriptor_sets.get(slot) {
            command_list.bind_descriptor_set(device_pipeline, descriptor_set)?;
        }

        match self.pipeline_type {
            PipelineType::Graphics => {
                let (width, height) = resources.extent;
                command_list.set_scissor(self.scissor.unwrap_or(Rect2D::from_size(width, height)))?;

                let buffers: Vec<_> = resources.data_buffers.iter().map(|b| b.buffer(slot).clone()).collect();
                command_list.bind_vertex_buffers(0, &buffers)?;
                if let Some(instance_buffers) = &resources.instance_buffers {
                    command_list.bind_vertex_buffers(buffers.len() as u32, &[instance_buffers.buffer(slot).clone()])?;
                }

                let counts = self.draw_counts();
                match &resources.index_buffers {
                    Some(index_buffers) => {
                        command_list.bind_index_buffer(index_buffers.buffer(slot), IndexType::U32)?;
                        command_list.draw_indexed(counts.elements, counts.instances)?;
                    }
                    None => command_list.draw(counts.elements, counts.instances)?,
                }
            }
            PipelineType::Compute => {
                let (width, height) = resources.extent;
                command_list.dispatch(
                    width.div_ceil(COMPUTE_GROUP_SIZE),
                    height.div_ceil(COMPUTE_GROUP_SIZE),
                    resources.layers,
                )?;
            }
        }
        Ok(pipeline.id())
    }

    /// The slot's command list now references the current buffers
    pub(crate) fn mark_recorded(&mut self, slot: usize) {
        let counts = self.draw_counts();
        for container in self.containers_mut() {
            container.mark_bound(slot);
        }
        if let Some(resources) = self.resources.as_mut() {
            resources.command_dirty[slot] = false;
            resources.recorded_counts[slot] = Some(counts);
        }
    }

    fn draw_counts(&self) -> DrawCounts {
        let elements = match &self.indices {
            Some(indices) => indices.row_count(),
            None => self.data.first().map_or(0, DataContainer::row_count),
        };
        let instances = self.instance_data.as_ref().map_or(1, DataContainer::row_count);
        DrawCounts { elements: elements as u32, instances: instances as u32 }
    }

    fn containers_mut(&mut self) -> impl Iterator<Item = &mut DataContainer> {
        self.data
            .iter_mut()
            .chain(self.instance_data.iter_mut())
            .chain(self.indices.iter_mut())
            .chain(self.uniform_data.iter_mut())
    }

    // ===== STATE =====

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn set_rendering_order(&mut self, rendering_order: i32) {
        self.rendering_order = rendering_order;
    }

    // ===== ACCESSORS =====

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipeline_type(&self) -> PipelineType {
        self.pipeline_type
    }

    /// Target the processor records into
    pub fn target(&self) -> TargetHandle {
        self.target
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn rendering_order(&self) -> i32 {
        self.rendering_order
    }

    pub fn pipeline(&self) -> Option<&Arc<Pipeline>> {
        self.resources.as_ref().map(|r| &r.pipeline)
    }

    /// Id of the resolved pipeline, 0 before initialization
    pub fn pipeline_id(&self) -> u32 {
        self.pipeline().map_or(0, |p| p.id())
    }

    pub fn layers_mask(&self) -> u8 {
        self.layers_mask
    }

    pub fn scissor(&self) -> Option<Rect2D> {
        self.scissor
    }

    pub fn texture_readers(&self) -> &[Vec<TextureReader>] {
        &self.texture_readers
    }

    /// Every texture sampled by this processor (with repetitions)
    pub fn textures_read(&self) -> impl Iterator<Item = TextureHandle> + '_ {
        self.texture_readers.iter().flatten().map(|reader| reader.texture)
    }

    /// Storage images written by this compute processor
    pub fn outputs(&self) -> &[TextureHandle] {
        &self.outputs
    }
}

/// Upload one container to a slot, returns true when the buffer was recreated
fn upload(
    container: &mut DataContainer,
    buffers: &mut PerFrameBuffers,
    device: &dyn GraphicsDevice,
    slot: usize,
) -> Result<bool> {
    if !container.has_new_data(slot)? {
        return Ok(false);
    }
    let recreated = buffers.update_data(device, slot, container.bytes())?;
    container.mark_uploaded(slot);
    if !recreated {
        // The recorded commands already reference this buffer
        container.mark_bound(slot);
    }
    Ok(recreated)
}

/// Bindings in layout order: uniforms, reader arrays, storage images
fn descriptor_writes(
    texture_readers: &[Vec<TextureReader>],
    outputs: &[TextureHandle],
    uniform_buffers: &[PerFrameBuffers],
    slot: usize,
    context: &mut GraphicsContext,
    textures: &TextureArena,
) -> Result<Vec<DescriptorWrite>> {
    let mut writes = Vec::with_capacity(uniform_buffers.len() + texture_readers.len() + outputs.len());
    let mut binding = 0;
    for buffers in uniform_buffers {
        writes.push(DescriptorWrite {
            binding,
            resource: DescriptorResource::UniformBuffer(buffers.buffer(slot).clone()),
        });
        binding += 1;
    }
    for readers in texture_readers {
        let mut images = Vec::with_capacity(readers.len());
        for reader in readers {
            let texture = textures
                .get(reader.texture)
                .ok_or_else(|| Error::InvalidResource("Texture reader uses a removed texture".to_string()))?;
            let sampler = context.sampler(&reader.param, texture.mip_levels())?;
            images.push((texture.image()?.clone(), sampler));
        }
        writes.push(DescriptorWrite { binding, resource: DescriptorResource::SampledImages(images) });
        binding += 1;
    }
    for output in outputs {
        let texture = textures
            .get(*output)
            .ok_or_else(|| Error::InvalidResource("Processor output uses a removed texture".to_string()))?;
        writes.push(DescriptorWrite { binding, resource: DescriptorResource::StorageImage(texture.image()?.clone()) });
        binding += 1;
    }
    Ok(writes)
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
