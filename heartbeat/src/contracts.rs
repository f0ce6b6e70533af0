use alloy::sol;

sol! {
    /// The parts of the federation contract used by heartbeats.
    #[sol(rpc)]
    #[derive(Debug)]
    interface Federation {
        event HeartBeat(
            address indexed sender,
            uint256 currentChainId,
            uint256 currentBlock,
            string fedVersion,
            uint256[] fedChainsIds,
            uint256[] fedChainsBlocks,
            string[] fedChainsInfo
        );

        function isMember(address _addr) external view returns (bool);

        function emitHeartbeat(
            string calldata fedVersion,
            uint256[] calldata fedChainsIds,
            uint256[] calldata fedChainsBlocks,
            string[] calldata fedChainsInfo
        ) external;
    }
}
