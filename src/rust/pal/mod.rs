// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// PAL: Platform Abstraction Layer
//======================================================================================================================

// This is the platform abstraction layer designed to hide architecture specific constants (cache line size and the
// alignment of freshly allocated packet buffers) from the packet buffer code.

pub mod arch;
