use std::path::PathBuf;

use serde::Serialize;

use crate::pairing::ReadPair;
use crate::record::project::Project;

/// QC tool run on every alignment
pub static BAM_QC: &str = "qualimap";
pub static TUMOR_SAMPLE_NAME: &str = "TUMOR";
pub static NORMAL_SAMPLE_NAME: &str = "NORMAL";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Somatic,
    Germline,
}

/// Everything the pipeline needs for one run, sent as JSON
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub analysis_type: AnalysisType,
    pub workdir: PathBuf,
    pub normal_sample: Option<ReadPair>,
    pub tumor_samples: Vec<ReadPair>,
    pub bed_file: Option<PathBuf>,
    pub mappers: String,
    pub variant_callers: String,
    pub annotation: String,
    pub bam_qc: &'static str,
    pub tumor_sample_name: &'static str,
    pub normal_sample_name: &'static str,
}

impl SubmissionRequest {
    pub fn new(
        project: &Project,
        workdir: PathBuf,
        normal_sample: Option<ReadPair>,
        tumor_samples: Vec<ReadPair>,
        bed_file: Option<PathBuf>,
    ) -> SubmissionRequest {
        let analysis_type = match project.is_somatic() {
            true => AnalysisType::Somatic,
            false => AnalysisType::Germline,
        };
        SubmissionRequest {
            analysis_type,
            workdir,
            normal_sample,
            tumor_samples,
            bed_file,
            mappers: project.algorithms.aligner.clone(),
            variant_callers: project.algorithms.variant_caller.clone(),
            annotation: project.algorithms.annotator.clone(),
            bam_qc: BAM_QC,
            tumor_sample_name: TUMOR_SAMPLE_NAME,
            normal_sample_name: NORMAL_SAMPLE_NAME,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::project::{Algorithms, ProjectStatus};
    use serde_json::json;

    fn project(project_type: &str) -> Project {
        Project {
            id: 3,
            user_id: 1,
            name: "liver".into(),
            project_type: project_type.into(),
            status: ProjectStatus::InProgress,
            algorithms: Algorithms {
                aligner: "bwa".into(),
                variant_caller: "mutect".into(),
                annotator: "vep".into(),
            },
            error: None,
            created_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn wire_shape() {
        let request = SubmissionRequest::new(
            &project("SM"),
            "/data/users/1/projects/3_liver".into(),
            Some(ReadPair("n_R1_.fq".into(), "n_R2_.fq".into())),
            vec![ReadPair("t_R1_.fq".into(), "t_R2_.fq".into())],
            None,
        );

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "analysisType": "somatic",
                "workdir": "/data/users/1/projects/3_liver",
                "normalSample": ["n_R1_.fq", "n_R2_.fq"],
                "tumorSamples": [["t_R1_.fq", "t_R2_.fq"]],
                "bedFile": null,
                "mappers": "bwa",
                "variantCallers": "mutect",
                "annotation": "vep",
                "bamQc": "qualimap",
                "tumorSampleName": "TUMOR",
                "normalSampleName": "NORMAL",
            })
        );
    }

    #[test]
    fn anything_but_sm_is_germline() {
        let request = SubmissionRequest::new(&project("GM"), "/w".into(), None, vec![], None);
        assert_eq!(request.analysis_type, AnalysisType::Germline);
    }
}
