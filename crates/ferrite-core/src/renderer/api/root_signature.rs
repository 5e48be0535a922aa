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

//! Root signature layouts.
//!
//! A root signature is an ordered list of root parameters. Each parameter is
//! either a raw view bound by GPU address, a block of inline 32-bit constants,
//! or a descriptor table made of one or more contiguous descriptor ranges.

use std::borrow::Cow;

/// The kind of descriptors a range of a descriptor table holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorRangeType {
    /// Shader resource views (`t` registers).
    Srv,
    /// Unordered access views (`u` registers).
    Uav,
    /// Constant buffer views (`b` registers).
    Cbv,
}

/// A contiguous run of descriptors of one type inside a descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorRange {
    /// The type of the descriptors.
    pub range_type: DescriptorRangeType,
    /// The number of descriptors in the range.
    pub count: u32,
    /// The first shader register the range maps to.
    pub base_register: u32,
    /// The register space.
    pub space: u32,
}

impl DescriptorRange {
    /// Creates a range of `count` descriptors starting at `base_register` in space 0.
    pub const fn new(range_type: DescriptorRangeType, count: u32, base_register: u32) -> Self {
        Self {
            range_type,
            count,
            base_register,
            space: 0,
        }
    }
}

/// Which shader stages can see a root parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShaderVisibility {
    /// Every stage.
    #[default]
    All,
    /// The vertex stage only.
    Vertex,
    /// The pixel stage only.
    Pixel,
}

/// A single binding slot of a root signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RootParameter {
    /// A constant buffer bound directly by GPU address.
    ConstantBufferView {
        /// The shader register.
        register: u32,
        /// The register space.
        space: u32,
        /// The stages that can see the binding.
        visibility: ShaderVisibility,
    },
    /// A shader resource bound directly by GPU address.
    ShaderResourceView {
        /// The shader register.
        register: u32,
        /// The register space.
        space: u32,
        /// The stages that can see the binding.
        visibility: ShaderVisibility,
    },
    /// A block of 32-bit values inlined in the root signature.
    Constants {
        /// The shader register.
        register: u32,
        /// The register space.
        space: u32,
        /// The number of 32-bit values.
        num_values: u32,
        /// The stages that can see the binding.
        visibility: ShaderVisibility,
    },
    /// A table of descriptors living in the shader-visible heap.
    DescriptorTable {
        /// The ranges, laid out contiguously in order.
        ranges: Vec<DescriptorRange>,
        /// The stages that can see the binding.
        visibility: ShaderVisibility,
    },
}

impl RootParameter {
    /// Creates a root constant buffer binding visible to every stage.
    pub const fn cbv(register: u32) -> Self {
        Self::ConstantBufferView {
            register,
            space: 0,
            visibility: ShaderVisibility::All,
        }
    }

    /// Creates a root shader resource binding visible to every stage.
    pub const fn srv(register: u32) -> Self {
        Self::ShaderResourceView {
            register,
            space: 0,
            visibility: ShaderVisibility::All,
        }
    }

    /// Creates a block of `num_values` inline constants visible to every stage.
    pub const fn constants(register: u32, num_values: u32) -> Self {
        Self::Constants {
            register,
            space: 0,
            num_values,
            visibility: ShaderVisibility::All,
        }
    }

    /// Creates a descriptor table visible to every stage.
    pub fn table(ranges: impl Into<Vec<DescriptorRange>>) -> Self {
        Self::DescriptorTable {
            ranges: ranges.into(),
            visibility: ShaderVisibility::All,
        }
    }

    /// The number of descriptors in the table, or `None` for non-table parameters.
    pub fn descriptor_table_size(&self) -> Option<u32> {
        match self {
            RootParameter::DescriptorTable { ranges, .. } => {
                Some(ranges.iter().map(|range| range.count).sum())
            }
            _ => None,
        }
    }
}

/// Filtering applied by a static sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    /// Nearest-neighbour filtering.
    Point,
    /// Linear filtering.
    #[default]
    Linear,
    /// Anisotropic filtering.
    Anisotropic,
}

/// Addressing applied outside of the [0, 1] range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    /// Repeat the texture.
    #[default]
    Wrap,
    /// Clamp to the edge texel.
    Clamp,
    /// Mirror the texture.
    Mirror,
}

/// A sampler baked into the root signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StaticSampler {
    /// The sampler register (`s` registers).
    pub register: u32,
    /// The filtering mode.
    pub filter: Filter,
    /// The addressing mode on every axis.
    pub address_mode: AddressMode,
    /// The stages that can see the sampler.
    pub visibility: ShaderVisibility,
}

/// A complete root signature layout, as handed to the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RootSignatureDesc<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The root parameters, indexed by root parameter index.
    pub parameters: Vec<RootParameter>,
    /// The samplers baked into the signature.
    pub static_samplers: Vec<StaticSampler>,
    /// Whether vertex input layouts are allowed.
    pub allow_input_layout: bool,
}

impl RootSignatureDesc<'_> {
    /// Iterates over `(root_index, table_size)` for every descriptor table parameter.
    pub fn descriptor_tables(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.parameters
            .iter()
            .enumerate()
            .filter_map(|(index, parameter)| {
                parameter
                    .descriptor_table_size()
                    .map(|size| (index as u32, size))
            })
    }

    /// Converts the layout into an owned one.
    pub fn into_owned(self) -> RootSignatureDesc<'static> {
        RootSignatureDesc {
            label: self.label.map(|label| Cow::Owned(label.into_owned())),
            parameters: self.parameters,
            static_samplers: self.static_samplers,
            allow_input_layout: self.allow_input_layout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_size_sums_ranges() {
        let table = RootParameter::table([
            DescriptorRange::new(DescriptorRangeType::Srv, 4, 0),
            DescriptorRange::new(DescriptorRangeType::Uav, 2, 0),
        ]);
        assert_eq!(table.descriptor_table_size(), Some(6));
        assert_eq!(RootParameter::cbv(0).descriptor_table_size(), None);
    }

    #[test]
    fn descriptor_tables_reports_root_indices() {
        let desc = RootSignatureDesc {
            parameters: vec![
                RootParameter::cbv(0),
                RootParameter::table([DescriptorRange::new(DescriptorRangeType::Srv, 3, 0)]),
                RootParameter::constants(1, 4),
                RootParameter::table([DescriptorRange::new(DescriptorRangeType::Uav, 1, 0)]),
            ],
            ..Default::default()
        };
        assert_eq!(desc.descriptor_tables().collect::<Vec<_>>(), vec![(1, 3), (3, 1)]);
    }
}
